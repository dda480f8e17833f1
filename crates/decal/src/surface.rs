//! Raster render targets.
//!
//! A [`RasterSurface`] is an explicit drawing target: the preview, each
//! export and each save get their own. It wraps a premultiplied RGBA
//! `tiny_skia::Pixmap` and keeps a canvas-like style state (fill color and
//! font) that [`RasterSurface::save`]/[`RasterSurface::restore`] bracket.
//!
//! Drawing a tainted [`Bitmap`] marks the whole surface tainted. A tainted
//! surface still draws, but refuses to hand its pixels out: every read-back
//! and encode fails with [`SurfaceError::Tainted`].

pub mod text;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage, codecs::jpeg::JpegEncoder};
use log::trace;
use thiserror::Error;
use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    StrokeDash, Transform,
};

use decal_core::{color::Color as DesignColor, geometry::Size};

use crate::{config::clamp_quality, resolve::Bitmap};

pub use text::{Font, TextManager};

/// Errors raised by a raster surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("cannot allocate a {width}x{height} surface")]
    Allocation { width: u32, height: u32 },

    #[error("the surface holds cross-origin pixels and cannot be read back")]
    Tainted,

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("invalid color: {0}")]
    Color(String),

    #[error("encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone)]
struct DrawState {
    fill: Color,
    font: Font,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            fill: Color::BLACK,
            font: Font::default(),
        }
    }
}

/// A premultiplied RGBA render target with a taint flag.
pub struct RasterSurface {
    pixmap: Pixmap,
    tainted: bool,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("tainted", &self.tainted)
            .finish()
    }
}

/// Parses a design color string into a surface color.
pub fn parse_color(value: &str) -> Result<Color, SurfaceError> {
    let color = DesignColor::new(value).map_err(SurfaceError::Color)?;
    let [r, g, b, a] = color.to_rgba8();
    Ok(Color::from_rgba8(r, g, b, a))
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Result<Rect, SurfaceError> {
    Rect::from_xywh(x, y, width, height).ok_or_else(|| {
        SurfaceError::Geometry(format!("rectangle {x},{y} {width}x{height}"))
    })
}

impl RasterSurface {
    /// Allocates a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Allocation`] for zero or oversized dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::Allocation { width, height })?;
        trace!(width, height; "Allocated raster surface");
        Ok(Self {
            pixmap,
            tainted: false,
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }

    /// Returns `true` once a cross-origin bitmap has been drawn.
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Pushes the current style state.
    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    /// Pops the style state pushed by the matching [`RasterSurface::save`].
    /// Unbalanced calls are ignored.
    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    pub fn set_fill(&mut self, color: Color) {
        self.state.fill = color;
    }

    /// Sets the fill from a design color string.
    pub fn set_fill_str(&mut self, color: &str) -> Result<(), SurfaceError> {
        self.state.fill = parse_color(color)?;
        Ok(())
    }

    pub fn set_font(&mut self, font: Font) {
        self.state.font = font;
    }

    pub fn font(&self) -> &Font {
        &self.state.font
    }

    /// Clears every pixel to transparent. The taint flag survives, as it
    /// would on a browser canvas.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    /// Paints the whole surface with the current fill.
    pub fn fill(&mut self) {
        let (width, height) = (self.width() as f32, self.height() as f32);
        // A live pixmap always has positive dimensions.
        if let Ok(area) = rect(0.0, 0.0, width, height) {
            self.pixmap
                .fill_rect(area, &self.paint(), Transform::identity(), None);
        }
    }

    fn paint(&self) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(self.state.fill);
        paint.anti_alias = true;
        paint
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<(), SurfaceError> {
        let area = rect(x, y, width, height)?;
        self.pixmap
            .fill_rect(area, &self.paint(), Transform::identity(), None);
        Ok(())
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32) -> Result<(), SurfaceError> {
        let invalid = || SurfaceError::Geometry(format!("circle at {cx},{cy} with radius {radius}"));
        if radius.is_nan() || radius <= 0.0 {
            return Err(invalid());
        }
        let path = PathBuilder::from_circle(cx, cy, radius).ok_or_else(invalid)?;
        self.pixmap.fill_path(
            &path,
            &self.paint(),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        Ok(())
    }

    /// Strokes a rectangle outline with a `dash`-on, `dash`-off pattern.
    pub fn stroke_dashed_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
        dash: f32,
    ) -> Result<(), SurfaceError> {
        let path = PathBuilder::from_rect(rect(x, y, width, height)?);
        let stroke = Stroke {
            width: line_width,
            dash: StrokeDash::new(vec![dash, dash], 0.0),
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &self.paint(), &stroke, Transform::identity(), None);
        Ok(())
    }

    /// Draws `bitmap` stretched into the given box.
    pub fn draw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), SurfaceError> {
        rect(x, y, width, height)?;
        let source = bitmap.pixmap();
        let transform = Transform::from_row(
            width / source.width() as f32,
            0.0,
            0.0,
            height / source.height() as f32,
            x,
            y,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);

        if bitmap.is_tainted() {
            self.tainted = true;
        }
        Ok(())
    }

    /// Draws text with the current font and fill, top-left aligned at `(x, y)`.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32) -> Size {
        TextManager::global().draw(
            &mut self.pixmap,
            text,
            &self.state.font,
            self.state.fill,
            x,
            y,
        )
    }

    /// Measures text with the current font.
    pub fn measure_text(&self, text: &str) -> Size {
        TextManager::global().measure(text, &self.state.font)
    }

    /// Draws text centered on the surface.
    pub fn draw_label_centered(&mut self, text: &str) -> Size {
        let size = self.measure_text(text);
        let x = (self.width() as f32 - size.width()) / 2.0;
        let y = (self.height() as f32 - size.height()) / 2.0;
        self.draw_text(text, x, y)
    }

    /// Returns the pixels as straight-alpha RGBA.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Tainted`] if a cross-origin bitmap was drawn.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, SurfaceError> {
        if self.tainted {
            return Err(SurfaceError::Tainted);
        }

        let mut data = Vec::with_capacity(self.pixmap.data().len());
        for px in self.pixmap.pixels() {
            let px = px.demultiply();
            data.extend_from_slice(&[px.red(), px.green(), px.blue(), px.alpha()]);
        }

        RgbaImage::from_raw(self.width(), self.height(), data).ok_or_else(|| {
            SurfaceError::Geometry(format!("{}x{} pixel buffer", self.width(), self.height()))
        })
    }

    /// Encodes the surface as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let image = self.to_rgba_image()?;
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Encodes the surface as JPEG.
    ///
    /// `quality` is a factor between 0.1 and 1.0 (clamped), mapped onto the
    /// encoder's 1..=100 scale. Alpha is dropped.
    pub fn encode_jpeg(&self, quality: f32) -> Result<Vec<u8>, SurfaceError> {
        let image = self.to_rgba_image()?;
        let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
        let quality = (clamp_quality(quality) * 100.0).round().clamp(1.0, 100.0) as u8;

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::resolve::BitmapOrigin;

    fn solid_bitmap(origin: BitmapOrigin) -> Bitmap {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(Color::from_rgba8(0, 0, 255, 255));
        Bitmap::new(Arc::new(pixmap), origin)
    }

    #[test]
    fn test_allocation_rejects_zero_size() {
        assert!(matches!(
            RasterSurface::new(0, 10),
            Err(SurfaceError::Allocation { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_fill_rect_and_read_back() {
        let mut surface = RasterSurface::new(10, 10).unwrap();
        surface.set_fill_str("#ff0000").unwrap();
        surface.fill_rect(0.0, 0.0, 5.0, 10.0).unwrap();

        let image = surface.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(2, 5).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(8, 5).0[3], 0);
    }

    #[test]
    fn test_save_restore_brackets_fill() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        surface.set_fill_str("#00ff00").unwrap();
        surface.save();
        surface.set_fill_str("#ff0000").unwrap();
        surface.set_font(Font::new("Arial", 40.0, "bold"));
        surface.restore();
        surface.fill();

        assert_eq!(surface.to_rgba_image().unwrap().get_pixel(1, 1).0, [0, 255, 0, 255]);
        assert_approx_eq!(f32, surface.font().size(), 16.0);

        // Unbalanced restore is harmless.
        surface.restore();
    }

    #[test]
    fn test_draw_bitmap_stretches() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface
            .draw_bitmap(&solid_bitmap(BitmapOrigin::Local), 0.0, 0.0, 20.0, 10.0)
            .unwrap();

        let image = surface.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(15, 5).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(15, 15).0[3], 0);
        assert!(!surface.is_tainted());
    }

    #[test]
    fn test_tainted_bitmap_blocks_encoding() {
        let mut surface = RasterSurface::new(8, 8).unwrap();
        surface
            .draw_bitmap(&solid_bitmap(BitmapOrigin::Tainted), 0.0, 0.0, 8.0, 8.0)
            .unwrap();
        surface.clear();

        assert!(surface.is_tainted());
        assert!(matches!(surface.encode_png(), Err(SurfaceError::Tainted)));
        assert!(matches!(surface.encode_jpeg(0.9), Err(SurfaceError::Tainted)));
    }

    #[test]
    fn test_encoders_produce_signatures() {
        let mut surface = RasterSurface::new(16, 16).unwrap();
        surface.set_fill(Color::WHITE);
        surface.fill();

        let png = surface.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let jpeg = surface.encode_jpeg(0.8).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_fill_circle_is_inscribed() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.set_fill(Color::BLACK);
        surface.fill_circle(10.0, 10.0, 10.0).unwrap();

        let image = surface.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(10, 10).0[3], 255);
        assert_eq!(image.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_invalid_geometry() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        assert!(surface.fill_rect(0.0, 0.0, -1.0, 2.0).is_err());
        assert!(surface.fill_circle(1.0, 1.0, 0.0).is_err());
        assert!(surface.set_fill_str("not-a-color").is_err());
    }
}

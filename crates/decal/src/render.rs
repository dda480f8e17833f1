//! The layer renderer: draws one layer onto a raster surface.

use log::debug;
use thiserror::Error;

use decal_core::{
    geometry::Size,
    image_ref::ImageReference,
    layer::{ImageLayer, Layer, LayerKind, ShapeKind, ShapeLayer, TextLayer},
};

use crate::{
    resolve::{Bitmap, ImageResolver},
    surface::{Font, RasterSurface, SurfaceError},
};

const NEUTRAL_FILL: &str = "#e5e7eb";
const NEUTRAL_LABEL_COLOR: &str = "#6b7280";
const NEUTRAL_LABEL: &str = "Image";
const NEUTRAL_LABEL_SIZE: f32 = 12.0;

/// What a render pass is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Interactive preview: unavailable images show a placeholder.
    Preview,
    /// Raster export: unavailable images are left out.
    Export,
    /// Export without any image layer, used after a cross-origin image
    /// blocked the regular export.
    SafeExport,
}

impl RenderMode {
    /// Returns `true` for the export modes.
    pub fn is_export(self) -> bool {
        !matches!(self, Self::Preview)
    }
}

/// Resolves `reference` for a pass in `mode`. Only preview passes count
/// toward the load progress; export passes run outside any preview round.
pub(crate) async fn resolve_image(
    resolver: &ImageResolver,
    reference: &ImageReference,
    mode: RenderMode,
) -> Bitmap {
    if mode.is_export() {
        resolver.resolve_untracked(reference).await
    } else {
        resolver.resolve(reference).await
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Draws `layer` at `scale`, bracketed by a style save/restore.
///
/// Returns the measured size, in surface pixels, for text layers, and
/// `None` for layers whose size is explicit or that were skipped.
///
/// # Errors
///
/// Returns [`RenderError`] if the layer's colors or geometry cannot be drawn.
/// Callers treat this as a per-layer failure.
pub async fn render_layer(
    surface: &mut RasterSurface,
    layer: &Layer,
    scale: f32,
    mode: RenderMode,
    resolver: &ImageResolver,
) -> Result<Option<Size>, RenderError> {
    surface.save();
    let result = match layer.kind() {
        LayerKind::Text(text) => draw_text(surface, layer, text, scale).map(Some),
        LayerKind::Image(image) => draw_image(surface, layer, image, scale, mode, resolver)
            .await
            .map(|_| None),
        LayerKind::Shape(shape) => draw_shape(surface, layer, shape, scale).map(|_| None),
    };
    surface.restore();
    result
}

fn draw_text(
    surface: &mut RasterSurface,
    layer: &Layer,
    text: &TextLayer,
    scale: f32,
) -> Result<Size, RenderError> {
    surface.set_fill_str(text.color())?;
    surface.set_font(Font::new(
        text.font_family(),
        f32::from(text.font_size()) * scale,
        text.font_weight(),
    ));

    let origin = layer.position().scale(scale);
    let measured = surface.draw_text(text.text(), origin.x(), origin.y());
    Ok(Size::new(measured.width(), f32::from(text.font_size()) * scale))
}

async fn draw_image(
    surface: &mut RasterSurface,
    layer: &Layer,
    image: &ImageLayer,
    scale: f32,
    mode: RenderMode,
    resolver: &ImageResolver,
) -> Result<(), RenderError> {
    if mode == RenderMode::SafeExport {
        return Ok(());
    }

    let origin = layer.position().scale(scale);
    let width = image.width() as f32 * scale;
    let height = image.height() as f32 * scale;

    let bitmap = resolve_image(resolver, &ImageReference::parse(image.src()), mode).await;
    if bitmap.is_placeholder() && mode.is_export() {
        debug!(layer_id = layer.id().as_str(); "Skipping unavailable image in export");
        return Ok(());
    }

    match surface.draw_bitmap(&bitmap, origin.x(), origin.y(), width, height) {
        Ok(()) => Ok(()),
        Err(err) if mode == RenderMode::Preview => {
            debug!(layer_id = layer.id().as_str(), err:err; "Image draw failed, drawing neutral box");
            draw_neutral_box(surface, origin.x(), origin.y(), width, height)
        }
        Err(err) => {
            debug!(layer_id = layer.id().as_str(), err:err; "Skipping undrawable image in export");
            Ok(())
        }
    }
}

/// Draws a gray box with a centered label where an image should be.
fn draw_neutral_box(
    surface: &mut RasterSurface,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> Result<(), RenderError> {
    surface.set_fill_str(NEUTRAL_FILL)?;
    surface.fill_rect(x, y, width.max(0.0), height.max(0.0))?;

    surface.set_fill_str(NEUTRAL_LABEL_COLOR)?;
    surface.set_font(Font::new("sans-serif", NEUTRAL_LABEL_SIZE, "normal"));
    let label = surface.measure_text(NEUTRAL_LABEL);
    surface.draw_text(
        NEUTRAL_LABEL,
        x + (width - label.width()) / 2.0,
        y + (height - label.height()) / 2.0,
    );
    Ok(())
}

fn draw_shape(
    surface: &mut RasterSurface,
    layer: &Layer,
    shape: &ShapeLayer,
    scale: f32,
) -> Result<(), RenderError> {
    surface.set_fill_str(shape.fill_color())?;

    let origin = layer.position().scale(scale);
    let width = shape.width() * scale;
    let height = shape.height() * scale;

    match shape.shape() {
        ShapeKind::Rectangle => surface.fill_rect(origin.x(), origin.y(), width, height)?,
        ShapeKind::Circle => surface.fill_circle(
            origin.x() + width / 2.0,
            origin.y() + height / 2.0,
            width / 2.0,
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use float_cmp::assert_approx_eq;

    use decal_core::{geometry::Point, layer::TextLayer};

    use super::*;
    use crate::{
        config::ResolverConfig,
        resolve::{FetchError, FetchMode, FetchedImage, ImageFetcher},
    };

    struct OfflineFetcher;

    #[async_trait::async_trait]
    impl ImageFetcher for OfflineFetcher {
        async fn fetch(&self, _: &url::Url, _: FetchMode) -> Result<FetchedImage, FetchError> {
            Err(FetchError::Transport("offline".to_string()))
        }
    }

    fn resolver() -> ImageResolver {
        ImageResolver::new(ResolverConfig::default(), Arc::new(OfflineFetcher)).unwrap()
    }

    fn pixel(surface: &RasterSurface, x: u32, y: u32) -> [u8; 4] {
        surface.to_rgba_image().unwrap().get_pixel(x, y).0
    }

    fn shape(kind: ShapeKind, x: f32, y: f32, w: f32, h: f32, color: &str) -> Layer {
        Layer::new(
            LayerKind::Shape(ShapeLayer::new(kind, w, h, color)),
            Point::new(x, y),
        )
    }

    #[tokio::test]
    async fn test_rectangle_is_scaled() {
        let mut surface = RasterSurface::new(100, 100).unwrap();
        let layer = shape(ShapeKind::Rectangle, 10.0, 10.0, 20.0, 10.0, "#ff0000");

        let size = render_layer(&mut surface, &layer, 2.0, RenderMode::Export, &resolver())
            .await
            .unwrap();
        assert!(size.is_none());
        assert_eq!(pixel(&surface, 25, 25), [255, 0, 0, 255]);
        assert_eq!(pixel(&surface, 61, 25)[3], 0);
        assert_eq!(pixel(&surface, 25, 41)[3], 0);
    }

    #[tokio::test]
    async fn test_circle_is_inscribed_using_width() {
        let mut surface = RasterSurface::new(60, 60).unwrap();
        let layer = shape(ShapeKind::Circle, 0.0, 0.0, 40.0, 40.0, "#0000ff");

        render_layer(&mut surface, &layer, 1.0, RenderMode::Preview, &resolver())
            .await
            .unwrap();
        assert_eq!(pixel(&surface, 20, 20), [0, 0, 255, 255]);
        assert_eq!(pixel(&surface, 1, 1)[3], 0);
        assert_eq!(pixel(&surface, 50, 20)[3], 0);
    }

    #[tokio::test]
    async fn test_text_reports_scaled_font_height() {
        let mut surface = RasterSurface::new(200, 100).unwrap();
        let layer = Layer::new(
            LayerKind::Text(TextLayer::new("Hello", "#000000", "Arial", 20)),
            Point::new(5.0, 5.0),
        );

        let size = render_layer(&mut surface, &layer, 1.5, RenderMode::Preview, &resolver())
            .await
            .unwrap()
            .unwrap();
        assert_approx_eq!(f32, size.height(), 30.0);
        assert!(size.width() > 0.0);
    }

    #[tokio::test]
    async fn test_invalid_color_fails_the_layer_only() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.set_fill_str("#00ff00").unwrap();
        let layer = shape(ShapeKind::Rectangle, 0.0, 0.0, 5.0, 5.0, "nope");

        let result = render_layer(&mut surface, &layer, 1.0, RenderMode::Preview, &resolver()).await;
        assert!(result.is_err());

        // The bracket restored the caller's fill.
        surface.fill();
        assert_eq!(pixel(&surface, 10, 10), [0, 255, 0, 255]);
    }

    #[tokio::test]
    async fn test_unavailable_image_preview_vs_export() {
        let layer = Layer::new(
            LayerKind::Image(ImageLayer::new("https://cdn.example.com/gone.png", 40, 40)),
            Point::new(0.0, 0.0),
        );
        let resolver = resolver();

        let mut preview = RasterSurface::new(50, 50).unwrap();
        render_layer(&mut preview, &layer, 1.0, RenderMode::Preview, &resolver)
            .await
            .unwrap();
        assert_eq!(pixel(&preview, 20, 3)[3], 255);

        let mut export = RasterSurface::new(50, 50).unwrap();
        render_layer(&mut export, &layer, 1.0, RenderMode::Export, &resolver)
            .await
            .unwrap();
        assert_eq!(pixel(&export, 20, 3)[3], 0);
    }

    #[tokio::test]
    async fn test_safe_export_skips_images_without_resolving() {
        let layer = Layer::new(
            LayerKind::Image(ImageLayer::new("https://cdn.example.com/a.png", 10, 10)),
            Point::default(),
        );
        let resolver = resolver();
        let mut surface = RasterSurface::new(10, 10).unwrap();

        render_layer(&mut surface, &layer, 1.0, RenderMode::SafeExport, &resolver)
            .await
            .unwrap();
        assert_eq!(resolver.progress().loaded(), 0);
    }
}

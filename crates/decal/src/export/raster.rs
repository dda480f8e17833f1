use log::{info, warn};

use decal_core::design::Design;

use crate::{
    compose::render_export_scene,
    render::RenderMode,
    resolve::ImageResolver,
    surface::{Font, RasterSurface, SurfaceError},
};

use super::{ExportFormat, ExportOptions};

const EXPORT_FILL: &str = "#ffffff";

const WATERMARK: &str = "Images omitted for export (cross-origin content)";
const WATERMARK_COLOR: &str = "#6b7280";
const WATERMARK_SIZE: f32 = 12.0;
const WATERMARK_MARGIN: f32 = 8.0;

pub(crate) struct EncodedRaster {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub degraded: bool,
}

/// Renders and encodes the raster export, falling back to a scene without
/// images when a cross-origin image tainted the first attempt.
pub(crate) async fn export_raster(
    design: &Design,
    options: &ExportOptions,
    resolver: &ImageResolver,
) -> Result<EncodedRaster, SurfaceError> {
    let scale = options.scale().factor();
    let (width, height) = design.canvas_size().scaled(scale);

    let surface = draw_scene(design, options, resolver, RenderMode::Export).await?;
    match encode(&surface, options) {
        Ok(bytes) => Ok(EncodedRaster {
            bytes,
            width,
            height,
            degraded: false,
        }),
        Err(SurfaceError::Tainted) => {
            warn!(
                format:% = options.format();
                "Export blocked by cross-origin image, exporting without images"
            );
            let mut surface = draw_scene(design, options, resolver, RenderMode::SafeExport).await?;
            draw_watermark(&mut surface, scale)?;
            let bytes = encode(&surface, options)?;
            Ok(EncodedRaster {
                bytes,
                width,
                height,
                degraded: true,
            })
        }
        Err(err) => Err(err),
    }
}

async fn draw_scene(
    design: &Design,
    options: &ExportOptions,
    resolver: &ImageResolver,
    mode: RenderMode,
) -> Result<RasterSurface, SurfaceError> {
    let scale = options.scale().factor();
    let (width, height) = design.canvas_size().scaled(scale);
    let mut surface = RasterSurface::new(width, height)?;

    surface.set_fill_str(EXPORT_FILL)?;
    surface.fill();

    let report =
        render_export_scene(&mut surface, design, options.base_image(), scale, mode, resolver)
            .await;
    info!(
        width,
        height,
        skipped = report.skipped().len(),
        failed = report.failed();
        "Export scene composited"
    );
    Ok(surface)
}

/// Draws the notice line along the bottom-left edge.
fn draw_watermark(surface: &mut RasterSurface, scale: f32) -> Result<(), SurfaceError> {
    surface.save();
    let result = surface.set_fill_str(WATERMARK_COLOR).map(|()| {
        surface.set_font(Font::new("sans-serif", WATERMARK_SIZE * scale, "normal"));
        let margin = WATERMARK_MARGIN * scale;
        let y = surface.height() as f32 - margin - WATERMARK_SIZE * scale;
        surface.draw_text(WATERMARK, margin, y);
    });
    surface.restore();
    result
}

fn encode(surface: &RasterSurface, options: &ExportOptions) -> Result<Vec<u8>, SurfaceError> {
    match options.format() {
        ExportFormat::Jpeg => surface.encode_jpeg(options.jpeg_quality()),
        _ => surface.encode_png(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use image::{ImageFormat, Rgba, RgbaImage};
    use url::Url;

    use decal_core::{
        design::CanvasSize,
        geometry::Point,
        layer::{ImageLayer, Layer, LayerKind, ShapeKind, ShapeLayer},
    };

    use super::*;
    use crate::{
        config::ResolverConfig,
        export::ResolutionScale,
        resolve::{FetchError, FetchMode, FetchedImage, ImageFetcher},
    };

    /// Serves a red square only to credentialed requests, without CORS
    /// headers, so every remote image comes back tainted.
    struct NoCorsFetcher;

    #[async_trait]
    impl ImageFetcher for NoCorsFetcher {
        async fn fetch(&self, _url: &Url, mode: FetchMode) -> Result<FetchedImage, FetchError> {
            match mode {
                FetchMode::Anonymous => Err(FetchError::NotApproved),
                FetchMode::Credentialed => {
                    let image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
                    let mut out = std::io::Cursor::new(Vec::new());
                    image.write_to(&mut out, ImageFormat::Png).unwrap();
                    Ok(FetchedImage::new(out.into_inner()).with_content_type("image/png"))
                }
            }
        }
    }

    fn design() -> Design {
        let mut design = Design::new(CanvasSize::new(100, 80), "#ffffff");
        design.push(Layer::new(
            LayerKind::Shape(ShapeLayer::new(ShapeKind::Rectangle, 20.0, 20.0, "#0000ff")),
            Point::new(0.0, 0.0),
        ));
        design.push(Layer::new(
            LayerKind::Image(ImageLayer::new("https://cdn.example.net/logo.png", 30, 30)),
            Point::new(50.0, 10.0),
        ));
        design
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory(bytes).unwrap().to_rgba8()
    }

    #[tokio::test]
    async fn test_tainted_export_falls_back_to_safe_scene() {
        let resolver = ImageResolver::new(ResolverConfig::default(), Arc::new(NoCorsFetcher)).unwrap();
        let options = ExportOptions::new(ExportFormat::Png, ResolutionScale::Double);

        let encoded = export_raster(&design(), &options, &resolver).await.unwrap();
        assert!(encoded.degraded);
        assert_eq!((encoded.width, encoded.height), (200, 160));

        let image = decode(&encoded.bytes);
        assert_eq!(image.dimensions(), (200, 160));
        // Shapes survive, the image area stays white.
        assert_eq!(image.get_pixel(10, 10).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(130, 50).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn test_watermark_is_drawn_near_bottom_left() {
        let mut surface = RasterSurface::new(400, 100).unwrap();
        surface.set_fill_str("#ffffff").unwrap();
        surface.fill();
        draw_watermark(&mut surface, 1.0).unwrap();

        let image = surface.to_rgba_image().unwrap();
        let inked = image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel.0 != [255, 255, 255, 255])
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        // Without system fonts nothing is drawn; otherwise ink stays in the
        // bottom band.
        assert!(inked.iter().all(|&(_, y)| y >= 60));
    }
}

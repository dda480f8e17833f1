//! The scene compositor.
//!
//! A scene is the product mockup (the base image) with every visible layer
//! painted over it in list order. The preview scene also outlines the
//! selected layer. Export scenes are drawn at a resolution multiplier and
//! never show selection.
//!
//! Layer failures are contained: the layer is logged and skipped. A failure
//! of the scene itself replaces the whole canvas with an error state.

use std::collections::HashMap;

use log::{debug, error, warn};

use decal_core::{
    design::Design,
    geometry::{Bounds, Size},
    identifier::LayerId,
    image_ref::ImageReference,
    layer::{Layer, LayerKind},
};

use crate::{
    render::{RenderError, RenderMode, render_layer, resolve_image},
    resolve::ImageResolver,
    surface::{Font, RasterSurface},
};

/// Size assumed for a layer whose extent is unknown.
pub const DEFAULT_LAYER_WIDTH: f32 = 100.0;
pub const DEFAULT_LAYER_HEIGHT: f32 = 50.0;

/// Distance between a layer's box and its selection outline.
pub const SELECTION_OFFSET: f32 = 5.0;

const SELECTION_COLOR: &str = "#3b82f6";
const SELECTION_LINE_WIDTH: f32 = 2.0;
const SELECTION_DASH: f32 = 5.0;

const NO_PRODUCT_FILL: &str = "#e5e7eb";
const NO_PRODUCT_LABEL: &str = "No product image";
const ERROR_FILL: &str = "#fee2e2";
const ERROR_LABEL: &str = "Unable to render design";
const STATUS_LABEL_COLOR: &str = "#4b5563";
const STATUS_LABEL_SIZE: f32 = 16.0;

/// Returns the size assumed for a layer whose extent is unknown.
pub fn default_layer_size() -> Size {
    Size::new(DEFAULT_LAYER_WIDTH, DEFAULT_LAYER_HEIGHT)
}

/// What happened while compositing a scene.
#[derive(Debug, Clone, Default)]
pub struct SceneReport {
    text_sizes: HashMap<LayerId, Size>,
    skipped: Vec<LayerId>,
    failed: bool,
}

impl SceneReport {
    /// Measured sizes of text layers, in logical (unscaled) pixels.
    pub fn text_sizes(&self) -> &HashMap<LayerId, Size> {
        &self.text_sizes
    }

    pub fn into_text_sizes(self) -> HashMap<LayerId, Size> {
        self.text_sizes
    }

    /// Layers that failed to render and were left out.
    pub fn skipped(&self) -> &[LayerId] {
        &self.skipped
    }

    /// Returns `true` if the scene was replaced by the error state.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

struct Scene<'a> {
    design: &'a Design,
    base_image: Option<&'a ImageReference>,
    selected: Option<&'a LayerId>,
    scale: f32,
    mode: RenderMode,
}

/// Composites the interactive preview at scale 1.
///
/// Starts a new load-progress round covering the base image and every
/// visible image layer.
pub async fn render_scene(
    surface: &mut RasterSurface,
    design: &Design,
    base_image: Option<&ImageReference>,
    selected: Option<&LayerId>,
    resolver: &ImageResolver,
) -> SceneReport {
    let pending = usize::from(base_image.is_some())
        + design
            .visible_layers()
            .filter(|layer| matches!(layer.kind(), LayerKind::Image(_)))
            .count();
    resolver.progress().expect(pending);

    let scene = Scene {
        design,
        base_image,
        selected,
        scale: 1.0,
        mode: RenderMode::Preview,
    };
    composite(surface, &scene, resolver).await
}

/// Composites an export scene at `scale`. No selection is drawn, and a base
/// image that cannot be loaded is left out.
///
/// The surface is not cleared, so a background fill drawn by the caller is
/// kept.
pub async fn render_export_scene(
    surface: &mut RasterSurface,
    design: &Design,
    base_image: Option<&ImageReference>,
    scale: f32,
    mode: RenderMode,
    resolver: &ImageResolver,
) -> SceneReport {
    let scene = Scene {
        design,
        base_image,
        selected: None,
        scale,
        mode,
    };
    composite(surface, &scene, resolver).await
}

async fn composite(
    surface: &mut RasterSurface,
    scene: &Scene<'_>,
    resolver: &ImageResolver,
) -> SceneReport {
    match try_composite(surface, scene, resolver).await {
        Ok(report) => report,
        Err(err) => {
            error!(err:err; "Scene rendering failed");
            draw_status(surface, ERROR_FILL, ERROR_LABEL);
            SceneReport {
                failed: true,
                ..SceneReport::default()
            }
        }
    }
}

async fn try_composite(
    surface: &mut RasterSurface,
    scene: &Scene<'_>,
    resolver: &ImageResolver,
) -> Result<SceneReport, RenderError> {
    if scene.mode == RenderMode::Preview {
        surface.clear();
    }

    draw_base(surface, scene, resolver).await?;

    let mut report = SceneReport::default();
    for layer in scene.design.visible_layers() {
        let measured = match render_layer(surface, layer, scene.scale, scene.mode, resolver).await {
            Ok(measured) => measured,
            Err(err) => {
                warn!(layer_id = layer.id().as_str(), err:err; "Skipping layer that failed to render");
                report.skipped.push(layer.id().clone());
                continue;
            }
        };

        let logical = measured.map(|size| size.scale(1.0 / scene.scale));
        if let Some(size) = logical {
            report.text_sizes.insert(layer.id().clone(), size);
        }

        if scene.selected == Some(layer.id()) {
            draw_selection(surface, layer, logical)?;
        }
    }

    debug!(
        layers = scene.design.len(),
        skipped = report.skipped.len(),
        scale = scene.scale;
        "Scene composited"
    );
    Ok(report)
}

async fn draw_base(
    surface: &mut RasterSurface,
    scene: &Scene<'_>,
    resolver: &ImageResolver,
) -> Result<(), RenderError> {
    let (width, height) = (surface.width() as f32, surface.height() as f32);

    match scene.base_image {
        Some(_) if scene.mode == RenderMode::SafeExport => {}
        Some(reference) => {
            let bitmap = resolve_image(resolver, reference, scene.mode).await;
            if bitmap.is_placeholder() && scene.mode.is_export() {
                debug!("Exporting without the product image");
            } else {
                surface.draw_bitmap(&bitmap, 0.0, 0.0, width, height)?;
            }
        }
        None if scene.mode == RenderMode::Preview => {
            draw_status(surface, NO_PRODUCT_FILL, NO_PRODUCT_LABEL);
        }
        None => {}
    }
    Ok(())
}

/// Bounds used for the selection outline and hit-testing: the measured size
/// if known, else the layer's explicit size, else the default.
pub fn layer_extent(layer: &Layer, measured: Option<Size>) -> Bounds {
    let size = measured
        .or_else(|| layer.explicit_size())
        .unwrap_or_else(default_layer_size);
    layer.bounds_with_size(size)
}

fn draw_selection(
    surface: &mut RasterSurface,
    layer: &Layer,
    measured: Option<Size>,
) -> Result<(), RenderError> {
    let outline = layer_extent(layer, measured).inflate(SELECTION_OFFSET);
    surface.save();
    let result = surface.set_fill_str(SELECTION_COLOR).and_then(|()| {
        surface.stroke_dashed_rect(
            outline.min_x(),
            outline.min_y(),
            outline.width(),
            outline.height(),
            SELECTION_LINE_WIDTH,
            SELECTION_DASH,
        )
    });
    surface.restore();
    result.map_err(RenderError::from)
}

/// Fills the canvas and centers a status label on it.
fn draw_status(surface: &mut RasterSurface, fill: &str, label: &str) {
    surface.save();
    surface.clear();
    if surface.set_fill_str(fill).is_ok() {
        surface.fill();
    }
    if surface.set_fill_str(STATUS_LABEL_COLOR).is_ok() {
        surface.set_font(Font::new("sans-serif", STATUS_LABEL_SIZE, "normal"));
        surface.draw_label_centered(label);
    }
    surface.restore();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use decal_core::{
        geometry::Point,
        layer::{ImageLayer, ShapeKind, ShapeLayer, TextLayer},
    };

    use super::*;
    use crate::{
        config::ResolverConfig,
        resolve::{FetchError, FetchMode, FetchedImage, ImageFetcher, decode::encode_data_url},
    };

    struct OfflineFetcher;

    #[async_trait::async_trait]
    impl ImageFetcher for OfflineFetcher {
        async fn fetch(&self, _: &url::Url, _: FetchMode) -> Result<FetchedImage, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    fn resolver() -> ImageResolver {
        ImageResolver::new(ResolverConfig::default(), Arc::new(OfflineFetcher)).unwrap()
    }

    fn pixel(surface: &RasterSurface, x: u32, y: u32) -> [u8; 4] {
        surface.to_rgba_image().unwrap().get_pixel(x, y).0
    }

    fn rect_layer(x: f32, y: f32, color: &str) -> Layer {
        Layer::new(
            LayerKind::Shape(ShapeLayer::new(ShapeKind::Rectangle, 20.0, 20.0, color)),
            Point::new(x, y),
        )
    }

    fn red_png_data_url() -> String {
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        encode_data_url("image/png", &out.into_inner())
    }

    #[tokio::test]
    async fn test_no_base_image_draws_neutral_background() {
        let mut surface = RasterSurface::new(100, 80).unwrap();
        let design = Design::default();

        let report = render_scene(&mut surface, &design, None, None, &resolver()).await;
        assert!(!report.failed());
        assert_eq!(pixel(&surface, 2, 2), [0xe5, 0xe7, 0xeb, 255]);
    }

    #[tokio::test]
    async fn test_base_image_is_stretched_and_layers_paint_in_order() {
        let mut surface = RasterSurface::new(100, 100).unwrap();
        let mut design = Design::default();
        design.push(rect_layer(10.0, 10.0, "#00ff00"));
        design.push(rect_layer(20.0, 20.0, "#0000ff"));
        let base = ImageReference::parse(&red_png_data_url());

        render_scene(&mut surface, &design, Some(&base), None, &resolver()).await;
        assert_eq!(pixel(&surface, 90, 90), [255, 0, 0, 255]);
        assert_eq!(pixel(&surface, 15, 15), [0, 255, 0, 255]);
        // Overlap goes to the later layer.
        assert_eq!(pixel(&surface, 25, 25), [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn test_hidden_layers_are_not_painted() {
        let mut surface = RasterSurface::new(50, 50).unwrap();
        let mut design = Design::default();
        let mut hidden = rect_layer(0.0, 0.0, "#ff0000");
        hidden.set_visible(false);
        design.push(hidden);

        render_scene(&mut surface, &design, None, None, &resolver()).await;
        assert_eq!(pixel(&surface, 5, 5), [0xe5, 0xe7, 0xeb, 255]);
    }

    #[tokio::test]
    async fn test_failed_layer_is_skipped_and_scene_continues() {
        let mut surface = RasterSurface::new(60, 60).unwrap();
        let mut design = Design::default();
        let broken = rect_layer(0.0, 0.0, "not-a-color");
        let broken_id = broken.id().clone();
        design.push(broken);
        design.push(rect_layer(30.0, 30.0, "#0000ff"));

        let report = render_scene(&mut surface, &design, None, None, &resolver()).await;
        assert_eq!(report.skipped(), &[broken_id]);
        assert!(!report.failed());
        assert_eq!(pixel(&surface, 35, 35), [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn test_selection_outline_is_offset() {
        let mut surface = RasterSurface::new(100, 100).unwrap();
        let mut design = Design::default();
        let layer = rect_layer(30.0, 30.0, "#000000");
        let id = layer.id().clone();
        design.push(layer);

        render_scene(&mut surface, &design, None, Some(&id), &resolver()).await;
        // Outline's top edge runs along y = 25, starting at x = 25 with a dash.
        let outline = pixel(&surface, 27, 25);
        assert!(outline[2] > 200 && outline[0] < 120, "unexpected outline pixel {outline:?}");
        // Inside the gap between layer and outline the background shows.
        assert_eq!(pixel(&surface, 27, 28), [0xe5, 0xe7, 0xeb, 255]);
    }

    #[tokio::test]
    async fn test_text_sizes_are_reported_unscaled() {
        let mut surface = RasterSurface::new(400, 200).unwrap();
        let mut design = Design::default();
        let text = Layer::new(
            LayerKind::Text(TextLayer::new("HI", "#000000", "Arial", 24)),
            Point::new(10.0, 10.0),
        );
        let id = text.id().clone();
        design.push(text);

        let report = render_export_scene(
            &mut surface,
            &design,
            None,
            2.0,
            RenderMode::Export,
            &resolver(),
        )
        .await;
        let size = report.text_sizes()[&id];
        assert!((size.height() - 24.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_preview_sets_progress_expectation() {
        let resolver = resolver();
        let mut surface = RasterSurface::new(50, 50).unwrap();
        let mut design = Design::default();
        design.push(Layer::new(
            LayerKind::Image(ImageLayer::new("https://cdn.example.com/x.png", 10, 10)),
            Point::default(),
        ));
        let base = ImageReference::parse("/products/shirt.png");

        render_scene(&mut surface, &design, Some(&base), None, &resolver).await;
        assert_eq!(resolver.progress().expected(), 2);
        assert!(resolver.progress().is_ready());
    }

    #[tokio::test]
    async fn test_export_scene_does_not_advance_preview_round() {
        let resolver = resolver();
        let mut design = Design::default();
        design.push(Layer::new(
            LayerKind::Image(ImageLayer::new("https://cdn.example.com/x.png", 10, 10)),
            Point::default(),
        ));
        let base = ImageReference::parse("https://cdn.example.com/shirt.png");
        resolver.progress().expect(2);

        let mut surface = RasterSurface::new(50, 50).unwrap();
        render_export_scene(
            &mut surface,
            &design,
            Some(&base),
            1.0,
            RenderMode::Export,
            &resolver,
        )
        .await;

        assert_eq!(resolver.progress().loaded(), 0);
        assert!(!resolver.progress().is_ready());
    }

    #[tokio::test]
    async fn test_export_scene_leaves_out_unavailable_base() {
        let mut surface = RasterSurface::new(40, 40).unwrap();
        surface.set_fill_str("#ffffff").unwrap();
        surface.fill();
        let base = ImageReference::parse("https://cdn.example.com/missing.png");

        render_export_scene(
            &mut surface,
            &Design::default(),
            Some(&base),
            1.0,
            RenderMode::Export,
            &resolver(),
        )
        .await;
        assert_eq!(pixel(&surface, 20, 20), [255, 255, 255, 255]);
    }

    #[test]
    fn test_layer_extent_fallbacks() {
        let text = Layer::new(
            LayerKind::Text(TextLayer::new("x", "#000000", "Arial", 12)),
            Point::new(1.0, 2.0),
        );
        let bounds = layer_extent(&text, None);
        assert!((bounds.width() - DEFAULT_LAYER_WIDTH).abs() < f32::EPSILON);
        assert!((bounds.height() - DEFAULT_LAYER_HEIGHT).abs() < f32::EPSILON);

        let measured = layer_extent(&text, Some(Size::new(30.0, 12.0)));
        assert!((measured.max_x() - 31.0).abs() < f32::EPSILON);

        let shape = rect_layer(0.0, 0.0, "#000000");
        assert!((layer_extent(&shape, None).width() - 20.0).abs() < f32::EPSILON);
    }
}

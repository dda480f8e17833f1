//! Decal - A layered product customization canvas.
//!
//! Text, image and shape layers are composited over a product mockup,
//! edited through pointer interaction, and exported as PNG, JPEG or SVG at
//! four resolution scales. Remote images are fetched with browser-like
//! cross-origin rules; an image that would taint an export is left out and
//! the export is marked degraded.

pub mod compose;
pub mod config;
pub mod editor;
pub mod export;
pub mod interaction;
pub mod persist;
pub mod render;
pub mod resolve;
pub mod surface;
pub mod upload;

mod error;

pub use decal_core::{color, design, geometry, identifier, image_ref, layer};

pub use error::DecalError;

use std::sync::Arc;

use log::{debug, info};

use decal_core::{design::Design, image_ref::ImageReference};

use config::AppConfig;
use editor::Editor;
use export::{Artifact, ExportFormat, ExportOptions, ResolutionScale, export_design};
use resolve::{ImageFetcher, ImageResolver};

/// Entry point for loading and exporting designs outside an interactive
/// session.
///
/// # Examples
///
/// ```rust,no_run
/// use decal::{Decal, config::AppConfig, export::{ExportFormat, ResolutionScale}};
///
/// # async fn run() -> Result<(), decal::DecalError> {
/// let decal = Decal::new(AppConfig::default())?;
/// let design = decal.parse_design(r##"{
///     "layers": [],
///     "canvasSize": { "width": 800, "height": 600 },
///     "backgroundColor": "#ffffff"
/// }"##)?;
///
/// let artifact = decal
///     .export(&design, ExportFormat::Png, ResolutionScale::Double, None, None)
///     .await?;
/// artifact.write_to(std::path::Path::new("."))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Decal {
    config: AppConfig,
    resolver: Arc<ImageResolver>,
}

impl Decal {
    /// Creates an instance that fetches remote images over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`DecalError::Config`] if the configured origin is invalid.
    pub fn new(config: AppConfig) -> Result<Self, DecalError> {
        let resolver = ImageResolver::with_http(config.resolver().clone())?;
        Ok(Self {
            config,
            resolver: Arc::new(resolver),
        })
    }

    /// Creates an instance that fetches remote images through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`DecalError::Config`] if the configured origin is invalid.
    pub fn with_fetcher(
        config: AppConfig,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Result<Self, DecalError> {
        let resolver = ImageResolver::new(config.resolver().clone(), fetcher)?;
        Ok(Self {
            config,
            resolver: Arc::new(resolver),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ImageResolver> {
        &self.resolver
    }

    /// Parses a design from JSON.
    ///
    /// Both a bare design and a saved design are accepted; save metadata is
    /// ignored. Font sizes are clamped as on creation.
    ///
    /// # Errors
    ///
    /// Returns [`DecalError::Json`] if the input is not a design, including
    /// blank text layers and repeated layer ids.
    pub fn parse_design(&self, json: &str) -> Result<Design, DecalError> {
        let design: Design = serde_json::from_str(json)?;
        debug!(
            layers = design.len(),
            width = design.canvas_size().width,
            height = design.canvas_size().height;
            "Design parsed"
        );
        Ok(design)
    }

    /// Exports `design` with the configured JPEG quality.
    ///
    /// # Errors
    ///
    /// Returns [`DecalError::Export`] if the export is refused or fails.
    pub async fn export(
        &self,
        design: &Design,
        format: ExportFormat,
        scale: ResolutionScale,
        base_image: Option<ImageReference>,
        product_name: Option<String>,
    ) -> Result<Artifact, DecalError> {
        let options = ExportOptions::new(format, scale)
            .with_base_image(base_image)
            .with_product_name(product_name)
            .with_jpeg_quality(self.config.export().jpeg_quality());
        let artifact = export_design(design, &options, &self.resolver).await?;
        info!(
            file_name = artifact.file_name(),
            bytes = artifact.bytes().len(),
            degraded = artifact.is_degraded();
            "Design exported"
        );
        Ok(artifact)
    }

    /// Opens `design` in an editor sharing this instance's resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub fn editor(&self, design: Design) -> Result<Editor, DecalError> {
        Editor::with_design(&self.config, Arc::clone(&self.resolver), design)
    }
}

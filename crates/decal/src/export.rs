//! The export pipeline.
//!
//! Turns a design into a downloadable [`Artifact`]: PNG or JPEG through the
//! raster path at one of four [`ResolutionScale`]s, or SVG through the
//! vector path at logical size.
//!
//! # Overview
//!
//! - [`ExportFormat`] - Output format.
//! - [`ResolutionScale`] - Raster resolution multiplier.
//! - [`ExportOptions`] - Everything an export needs besides the design.
//! - [`export_design`] - Runs the pipeline.
//! - [`Artifact`] - The encoded result plus its file name.

pub(crate) mod raster;
pub mod svg;

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::Utc;
use log::info;
use thiserror::Error;

use decal_core::{design::Design, image_ref::ImageReference};

use crate::{config::clamp_quality, resolve::ImageResolver, surface::SurfaceError};

/// File name prefix shared by every artifact.
const FILE_PREFIX: &str = "design";

/// Product slug used when no product name is known.
const FALLBACK_SLUG: &str = "custom";

/// Why an export produced no artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Add at least one element to your design before exporting.")]
    EmptyDesign,

    #[error("Images are still loading. Please wait a moment and try again.")]
    SceneNotReady,

    #[error("Unable to export design: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Unable to write export: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported export format `{0}`, expected png, jpeg or svg")]
    UnknownFormat(String),

    #[error("unsupported resolution scale `{0}`, expected 0.75, 1, 1.5 or 2")]
    UnknownScale(String),
}

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Svg,
}

impl ExportFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Svg => "svg",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Returns `true` for formats drawn through the raster path.
    pub fn is_raster(self) -> bool {
        !matches!(self, Self::Svg)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "svg" => Ok(Self::Svg),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Raster resolution multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolutionScale {
    /// 0.75x
    Reduced,
    /// 1x
    #[default]
    Standard,
    /// 1.5x
    High,
    /// 2x
    Double,
}

impl ResolutionScale {
    /// Every supported scale, smallest first.
    pub const ALL: [Self; 4] = [Self::Reduced, Self::Standard, Self::High, Self::Double];

    pub fn factor(self) -> f32 {
        match self {
            Self::Reduced => 0.75,
            Self::Standard => 1.0,
            Self::High => 1.5,
            Self::Double => 2.0,
        }
    }
}

impl fmt::Display for ResolutionScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

impl FromStr for ResolutionScale {
    type Err = ExportError;

    /// Parses `0.75`, `1`, `1.5` or `2`, with an optional trailing `x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().trim_end_matches(['x', 'X']);
        let factor: f32 = value
            .parse()
            .map_err(|_| ExportError::UnknownScale(s.to_string()))?;
        Self::ALL
            .into_iter()
            .find(|scale| (scale.factor() - factor).abs() < f32::EPSILON)
            .ok_or_else(|| ExportError::UnknownScale(s.to_string()))
    }
}

/// Settings for one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    format: ExportFormat,
    scale: ResolutionScale,
    base_image: Option<ImageReference>,
    product_name: Option<String>,
    jpeg_quality: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            scale: ResolutionScale::default(),
            base_image: None,
            product_name: None,
            jpeg_quality: 0.92,
        }
    }
}

impl ExportOptions {
    pub fn new(format: ExportFormat, scale: ResolutionScale) -> Self {
        Self {
            format,
            scale,
            ..Self::default()
        }
    }

    /// Sets the product mockup drawn under the layers (builder style).
    pub fn with_base_image(mut self, base_image: Option<ImageReference>) -> Self {
        self.base_image = base_image;
        self
    }

    /// Sets the product name used in the file name (builder style).
    pub fn with_product_name(mut self, product_name: Option<String>) -> Self {
        self.product_name = product_name;
        self
    }

    /// Sets the JPEG quality factor, clamped to 0.1..=1.0 (builder style).
    pub fn with_jpeg_quality(mut self, quality: f32) -> Self {
        self.jpeg_quality = clamp_quality(quality);
        self
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn scale(&self) -> ResolutionScale {
        self.scale
    }

    pub fn base_image(&self) -> Option<&ImageReference> {
        self.base_image.as_ref()
    }

    pub fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }

    pub fn jpeg_quality(&self) -> f32 {
        self.jpeg_quality
    }
}

/// An encoded export ready to be written out.
#[derive(Debug, Clone)]
pub struct Artifact {
    file_name: String,
    format: ExportFormat,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    degraded: bool,
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Pixel width for raster artifacts; logical canvas width for SVG.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` if cross-origin images had to be left out.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Writes the artifact into `dir` under its file name.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if the file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        info!(path:? = path, bytes = self.bytes.len(); "Export written");
        Ok(path)
    }
}

/// Lowercases `name` and collapses everything but ASCII letters and digits
/// into single dashes.
///
/// # Examples
///
/// ```
/// # use decal::export::slugify;
/// assert_eq!(slugify("Classic Tee (White)"), "classic-tee-white");
/// assert_eq!(slugify("  "), "");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Builds `design-<product slug>-<unix millis>.<ext>`.
pub fn artifact_file_name(product_name: Option<&str>, format: ExportFormat) -> String {
    let slug = product_name
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| FALLBACK_SLUG.to_string());
    format!(
        "{FILE_PREFIX}-{slug}-{}.{}",
        Utc::now().timestamp_millis(),
        format.extension()
    )
}

/// Exports `design`.
///
/// # Errors
///
/// Returns [`ExportError::EmptyDesign`] for a design without layers,
/// [`ExportError::SceneNotReady`] while the resolver still has images
/// loading, and [`ExportError::Surface`] if the raster surface cannot be
/// allocated or encoded.
pub async fn export_design(
    design: &Design,
    options: &ExportOptions,
    resolver: &ImageResolver,
) -> Result<Artifact, ExportError> {
    if design.is_empty() {
        return Err(ExportError::EmptyDesign);
    }
    if !resolver.progress().is_ready() {
        return Err(ExportError::SceneNotReady);
    }

    info!(
        format:% = options.format(),
        scale:% = options.scale(),
        layers = design.len();
        "Exporting design"
    );

    let file_name = artifact_file_name(options.product_name(), options.format());
    let artifact = if options.format().is_raster() {
        let encoded = raster::export_raster(design, options, resolver).await?;
        Artifact {
            file_name,
            format: options.format(),
            bytes: encoded.bytes,
            width: encoded.width,
            height: encoded.height,
            degraded: encoded.degraded,
        }
    } else {
        let canvas = design.canvas_size();
        Artifact {
            file_name,
            format: options.format(),
            bytes: svg::render_svg(design).to_string().into_bytes(),
            width: canvas.width,
            height: canvas.height,
            degraded: false,
        }
    };

    Ok(artifact)
}

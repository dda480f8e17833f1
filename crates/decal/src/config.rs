//! Configuration types for the Decal editor.
//!
//! This module provides configuration structures that constrain what a
//! shopper may put on a design, how remote images are fetched, and how
//! exports are encoded. All types implement [`serde::Deserialize`] for
//! loading from external sources, and every field is optional: anything the
//! customization collaborator leaves out falls back to a hard-coded default.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`CustomizationConfig`] - Allowed fonts and colors, text and image limits.
//! - [`ResolverConfig`] - Storefront origin, image proxy and fetch deadline.
//! - [`ExportConfig`] - Encoder settings.
//!
//! # Example
//!
//! ```
//! # use decal::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.customization().max_images(), 5);
//! assert!(config.resolver().origin().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use decal_core::color::is_hex_color;

/// Fonts offered when the collaborator does not configure any.
pub const DEFAULT_FONTS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Courier New",
    "Verdana",
];

/// Palette offered when the collaborator does not configure one.
pub const DEFAULT_COLORS: &[&str] = &[
    "#000000", "#ffffff", "#ff0000", "#00ff00", "#0000ff", "#ffff00", "#ff00ff", "#00ffff",
];

const DEFAULT_MAX_TEXT_LENGTH: usize = 100;
const DEFAULT_MAX_IMAGES: usize = 5;
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_PROXY_PATH: &str = "/api/image-proxy";
const DEFAULT_PROXIED_HOSTS: &[&str] = &[
    "firebasestorage.googleapis.com",
    "storage.googleapis.com",
    "s3.amazonaws.com",
];
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_JPEG_QUALITY: f32 = 0.92;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Customization constraints section.
    #[serde(default)]
    customization: CustomizationConfig,

    /// Image resolver section.
    #[serde(default)]
    resolver: ResolverConfig,

    /// Export section.
    #[serde(default)]
    export: ExportConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(
        customization: CustomizationConfig,
        resolver: ResolverConfig,
        export: ExportConfig,
    ) -> Self {
        Self {
            customization,
            resolver,
            export,
        }
    }

    /// Returns the customization constraints.
    pub fn customization(&self) -> &CustomizationConfig {
        &self.customization
    }

    /// Returns the image resolver configuration.
    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    /// Returns the export configuration.
    pub fn export(&self) -> &ExportConfig {
        &self.export
    }
}

/// Constraints the customization collaborator places on a design.
///
/// Fonts and colors are only enforced when configured; the defaults are
/// what an editor offers, not a restriction.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CustomizationConfig {
    #[serde(default)]
    allowed_fonts: Option<Vec<String>>,

    #[serde(default)]
    allowed_colors: Option<Vec<String>>,

    #[serde(default)]
    max_text_length: Option<usize>,

    #[serde(default)]
    max_images: Option<usize>,
}

impl CustomizationConfig {
    /// Restricts text layers to `fonts` (builder style).
    pub fn with_allowed_fonts<I, S>(mut self, fonts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fonts = Some(fonts.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts layer colors to `colors` (builder style).
    pub fn with_allowed_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_colors = Some(colors.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the maximum text length in characters (builder style).
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = Some(max);
        self
    }

    /// Sets the maximum number of image layers (builder style).
    pub fn with_max_images(mut self, max: usize) -> Self {
        self.max_images = Some(max);
        self
    }

    /// Returns the fonts to offer: the configured list, or [`DEFAULT_FONTS`].
    pub fn allowed_fonts(&self) -> Vec<&str> {
        match &self.allowed_fonts {
            Some(fonts) => fonts.iter().map(String::as_str).collect(),
            None => DEFAULT_FONTS.to_vec(),
        }
    }

    /// Returns the colors to offer: the configured list, or [`DEFAULT_COLORS`].
    pub fn allowed_colors(&self) -> Vec<&str> {
        match &self.allowed_colors {
            Some(colors) => colors.iter().map(String::as_str).collect(),
            None => DEFAULT_COLORS.to_vec(),
        }
    }

    /// Returns `true` if `font` may be used on a text layer.
    pub fn is_font_allowed(&self, font: &str) -> bool {
        self.allowed_fonts
            .as_ref()
            .is_none_or(|fonts| fonts.iter().any(|allowed| allowed == font))
    }

    /// Returns `true` if `color` is a hex color and, when a palette is
    /// configured, part of it. Comparison ignores ASCII case.
    pub fn is_color_allowed(&self, color: &str) -> bool {
        is_hex_color(color)
            && self.allowed_colors.as_ref().is_none_or(|colors| {
                colors
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(color))
            })
    }

    /// Returns the maximum text length in characters.
    pub fn max_text_length(&self) -> usize {
        self.max_text_length.unwrap_or(DEFAULT_MAX_TEXT_LENGTH)
    }

    /// Returns the maximum number of image layers per design.
    pub fn max_images(&self) -> usize {
        self.max_images.unwrap_or(DEFAULT_MAX_IMAGES)
    }
}

/// How the image resolver reaches remote images.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Origin the storefront is served from. Same-origin images are always
    /// pixel-readable.
    #[serde(default = "default_origin")]
    origin: String,

    /// Path on the origin that proxies remote images.
    #[serde(default = "default_proxy_path")]
    proxy_path: String,

    /// Hosts whose images must go through the proxy.
    #[serde(default = "default_proxied_hosts")]
    proxied_hosts: Vec<String>,

    /// Deadline for a single network fetch, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    fetch_timeout_ms: u64,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_proxy_path() -> String {
    DEFAULT_PROXY_PATH.to_string()
}

fn default_proxied_hosts() -> Vec<String> {
    DEFAULT_PROXIED_HOSTS.iter().map(|h| h.to_string()).collect()
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            proxy_path: default_proxy_path(),
            proxied_hosts: default_proxied_hosts(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl ResolverConfig {
    /// Sets the storefront origin (builder style).
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the proxied hosts (builder style).
    pub fn with_proxied_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxied_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the fetch deadline (builder style).
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the parsed storefront origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured origin is not an absolute URL.
    pub fn origin(&self) -> Result<Url, String> {
        Url::parse(&self.origin)
            .map_err(|err| format!("Invalid resolver origin `{}` in config: {err}", self.origin))
    }

    pub fn proxy_path(&self) -> &str {
        &self.proxy_path
    }

    pub fn proxied_hosts(&self) -> &[String] {
        &self.proxied_hosts
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Encoder settings for exports.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// JPEG quality factor between 0.1 and 1.0.
    #[serde(default = "default_jpeg_quality")]
    jpeg_quality: f32,
}

fn default_jpeg_quality() -> f32 {
    DEFAULT_JPEG_QUALITY
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl ExportConfig {
    /// Sets the JPEG quality factor (builder style).
    pub fn with_jpeg_quality(mut self, quality: f32) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Returns the JPEG quality factor clamped to 0.1..=1.0.
    pub fn jpeg_quality(&self) -> f32 {
        clamp_quality(self.jpeg_quality)
    }
}

/// Clamps a JPEG quality factor to the supported 0.1..=1.0 range.
pub(crate) fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        DEFAULT_JPEG_QUALITY
    } else {
        quality.clamp(0.1, 1.0)
    }
}

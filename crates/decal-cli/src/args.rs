//! Command-line argument definitions for the Decal CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the design file, the export format and
//! scale, the output directory, configuration and logging verbosity.

use clap::Parser;

use decal::export::{ExportFormat, ResolutionScale};

/// Command-line arguments for the Decal exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the design JSON file (a bare design or a saved design)
    #[arg(help = "Path to the design file")]
    pub input: String,

    /// Directory the export is written to
    #[arg(short, long, default_value = ".")]
    pub output: String,

    /// Export format (png, jpeg, svg)
    #[arg(short, long, default_value = "png")]
    pub format: ExportFormat,

    /// Resolution scale for raster formats (0.75, 1, 1.5, 2)
    #[arg(short, long, default_value = "1")]
    pub scale: ResolutionScale,

    /// JPEG quality between 0.1 and 1.0, overriding the configuration
    #[arg(long)]
    pub quality: Option<f32>,

    /// Product mockup drawn under the layers (URL, /path or data: URL)
    #[arg(long)]
    pub base_image: Option<String>,

    /// Product name used in the output file name
    #[arg(long)]
    pub product_name: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

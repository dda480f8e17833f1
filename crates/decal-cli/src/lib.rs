//! CLI logic for the Decal exporter.
//!
//! Loads a design file and writes one export to the output directory.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;

use decal::{Decal, DecalError, config::AppConfig, image_ref::ImageReference};

/// Run the Decal CLI application
///
/// Reads the design named by `args.input`, exports it in the requested format
/// and scale, and writes the artifact into `args.output`.
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns `DecalError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Invalid design JSON
/// - Refused or failed exports
pub async fn run(args: &Args) -> Result<PathBuf, DecalError> {
    info!(
        input_path = args.input,
        output_dir = args.output,
        format:% = args.format,
        scale:% = args.scale;
        "Processing design"
    );

    let app_config = with_quality_override(config::load_config(args.config.as_ref())?, args.quality);

    let source = fs::read_to_string(&args.input)?;

    let decal = Decal::new(app_config)?;
    let design = decal.parse_design(&source)?;
    let artifact = decal
        .export(
            &design,
            args.format,
            args.scale,
            args.base_image.as_deref().map(ImageReference::parse),
            args.product_name.clone(),
        )
        .await?;

    let output_dir = Path::new(&args.output);
    fs::create_dir_all(output_dir)?;
    let path = artifact.write_to(output_dir)?;

    info!(output_file:? = path, degraded = artifact.is_degraded(); "Design exported successfully");

    Ok(path)
}

fn with_quality_override(config: AppConfig, quality: Option<f32>) -> AppConfig {
    match quality {
        Some(quality) => AppConfig::new(
            config.customization().clone(),
            config.resolver().clone(),
            config.export().clone().with_jpeg_quality(quality),
        ),
        None => config,
    }
}

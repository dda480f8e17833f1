//! Error types for Decal operations.
//!
//! This module provides the main error type [`DecalError`] which wraps the
//! failures an orchestrating caller (the editor, the CLI) can see. Leaf
//! failures such as a single image failing to decode never reach it; they are
//! contained where they happen and logged.

use std::io;

use thiserror::Error;

use decal_core::design::DesignError;

use crate::{
    editor::EditError, export::ExportError, persist::SaveError, surface::SurfaceError,
    upload::UploadError,
};

/// The main error type for Decal operations.
#[derive(Debug, Error)]
pub enum DecalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid design data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid design: {0}")]
    Design(#[from] DesignError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Save error: {0}")]
    Save(#[from] SaveError),

    #[error("{0}")]
    Edit(#[from] EditError),

    #[error("Upload rejected: {0}")]
    Upload(#[from] UploadError),

    #[error("Drawing surface error: {0}")]
    Surface(#[from] SurfaceError),
}

impl DecalError {
    /// Creates a configuration error from any displayable cause.
    pub fn config(cause: impl std::fmt::Display) -> Self {
        Self::Config(cause.to_string())
    }
}

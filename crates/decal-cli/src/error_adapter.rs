//! Error adapter for converting DecalError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use decal::{DecalError, export::ExportError};

/// Adapter giving a [`DecalError`] a diagnostic code and, where one helps,
/// a hint.
pub struct ErrorAdapter<'a>(pub &'a DecalError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            DecalError::Io(_) => "decal::io",
            DecalError::Json(_) => "decal::json",
            DecalError::Design(_) => "decal::design",
            DecalError::Config(_) => "decal::config",
            DecalError::Export(_) => "decal::export",
            DecalError::Save(_) => "decal::save",
            DecalError::Edit(_) => "decal::edit",
            DecalError::Upload(_) => "decal::upload",
            DecalError::Surface(_) => "decal::surface",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            DecalError::Json(_) => "the input must be a design or saved design JSON document",
            DecalError::Export(ExportError::EmptyDesign) => {
                "add a text, image or shape layer to the design's `layers` array"
            }
            DecalError::Design(_) => "give every layer in the design a distinct `id`",
            DecalError::Config(_) => "see the [customization], [resolver] and [export] sections",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(err: &DecalError) -> String {
        ErrorAdapter(err).code().unwrap().to_string()
    }

    #[test]
    fn test_codes_follow_variant() {
        assert_eq!(code(&DecalError::config("bad")), "decal::config");
        assert_eq!(
            code(&DecalError::Export(ExportError::SceneNotReady)),
            "decal::export"
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(code(&DecalError::Io(io)), "decal::io");
    }

    #[test]
    fn test_display_is_forwarded() {
        let err = DecalError::Export(ExportError::EmptyDesign);
        let adapter = ErrorAdapter(&err);
        assert_eq!(adapter.to_string(), err.to_string());
        assert!(adapter.help().is_some());
    }

    #[test]
    fn test_help_only_where_useful() {
        let err = DecalError::Export(ExportError::SceneNotReady);
        assert!(ErrorAdapter(&err).help().is_none());
    }
}

//! Image references.
//!
//! An image layer's `src` string names its bitmap in one of several ways.
//! [`ImageReference`] is the parsed form the image resolver dispatches on.

use std::fmt;

use url::Url;

const DATA_URL_PREFIX: &str = "data:";
const REDACTED_PREFIX: &str = "[EXTERNAL:";
const REDACTED_SUFFIX: &str = "]";

/// Basename used in redaction tokens when a URL has no usable path segment.
const FALLBACK_BASENAME: &str = "image";

/// A logical reference to an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// A self-contained `data:` URL; decoding needs no network access.
    Embedded(String),
    /// An absolute `http`/`https` URL.
    Remote(Url),
    /// A path relative to the storefront origin, e.g. `/images/shirt.png`.
    Relative(String),
    /// The token left in place of a remote URL when a design was saved.
    Redacted(String),
    /// Anything else. Resolves to a placeholder.
    Unsupported(String),
}

impl ImageReference {
    /// Parses a layer `src` string.
    ///
    /// # Examples
    ///
    /// ```
    /// # use decal_core::image_ref::ImageReference;
    /// assert!(matches!(
    ///     ImageReference::parse("data:image/png;base64,iVBORw0KGgo="),
    ///     ImageReference::Embedded(_)
    /// ));
    /// assert!(matches!(
    ///     ImageReference::parse("https://cdn.example.com/shirt.png"),
    ///     ImageReference::Remote(_)
    /// ));
    /// assert_eq!(
    ///     ImageReference::parse("[EXTERNAL:logo.png]"),
    ///     ImageReference::Redacted("logo.png".to_string())
    /// );
    /// ```
    pub fn parse(src: &str) -> Self {
        let src = src.trim();

        if src.starts_with(DATA_URL_PREFIX) {
            return Self::Embedded(src.to_string());
        }

        if let Some(name) = src
            .strip_prefix(REDACTED_PREFIX)
            .and_then(|rest| rest.strip_suffix(REDACTED_SUFFIX))
        {
            return Self::Redacted(name.to_string());
        }

        if src.starts_with('/') && !src.starts_with("//") {
            return Self::Relative(src.to_string());
        }

        match Url::parse(src) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            _ => Self::Unsupported(src.to_string()),
        }
    }

    /// Returns `true` for references that need no network access.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    /// Returns the token a saved design stores instead of this reference,
    /// or `None` if the reference is persisted verbatim.
    ///
    /// Only embedded data survives a save; every other reference becomes
    /// `[EXTERNAL:<basename>]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use decal_core::image_ref::ImageReference;
    /// let remote = ImageReference::parse("https://cdn.example.com/a/b/logo.png?v=2");
    /// assert_eq!(remote.redacted().as_deref(), Some("[EXTERNAL:logo.png]"));
    ///
    /// let embedded = ImageReference::parse("data:image/png;base64,AAAA");
    /// assert_eq!(embedded.redacted(), None);
    /// ```
    pub fn redacted(&self) -> Option<String> {
        let basename = match self {
            Self::Embedded(_) => return None,
            Self::Redacted(name) => name.clone(),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .unwrap_or(FALLBACK_BASENAME)
                .to_string(),
            Self::Relative(path) | Self::Unsupported(path) => path_basename(path),
        };
        Some(format!("{REDACTED_PREFIX}{basename}{REDACTED_SUFFIX}"))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded(_) => f.write_str("embedded image data"),
            Self::Remote(url) => write!(f, "{url}"),
            Self::Relative(path) | Self::Unsupported(path) => f.write_str(path),
            Self::Redacted(name) => write!(f, "{REDACTED_PREFIX}{name}{REDACTED_SUFFIX}"),
        }
    }
}

fn path_basename(path: &str) -> String {
    let without_query = path.split(['?', '#']).next().unwrap_or_default();
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(FALLBACK_BASENAME)
        .to_string()
}

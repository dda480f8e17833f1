//! Layer identifiers.
//!
//! This module provides the [`LayerId`] type. Ids are assigned by a generator
//! when a layer is created and are never reused, so an id stays a stable
//! handle for selection and drag even while the layer list is reordered.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every generated layer id.
const LAYER_ID_PREFIX: &str = "layer-";

/// Unique identifier of a layer within a design.
///
/// # Examples
///
/// ```
/// use decal_core::identifier::LayerId;
///
/// let a = LayerId::generate();
/// let b = LayerId::generate();
/// assert_ne!(a, b);
/// assert!(a.as_str().starts_with("layer-"));
///
/// // Ids loaded from a saved design are kept verbatim
/// let loaded = LayerId::new("text-1700000000000");
/// assert_eq!(loaded, "text-1700000000000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Wraps an existing id string, e.g. one read back from a saved design.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id that has never been handed out before.
    ///
    /// Ids are random (UUID v4) rather than time based, so two layers created
    /// within the same millisecond still get distinct ids.
    pub fn generate() -> Self {
        Self(format!("{LAYER_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for LayerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for LayerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

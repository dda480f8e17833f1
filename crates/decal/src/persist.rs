//! Saving designs.
//!
//! A save is a [`SavedDesign`] JSON document plus a PNG preview, handed to a
//! [`DesignStore`]. Remote image references are replaced by
//! `[EXTERNAL:<basename>]` tokens before they leave the process; embedded
//! images are stored verbatim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use decal_core::{
    design::{CanvasSize, Design, DesignError},
    image_ref::ImageReference,
    layer::{Layer, LayerKind},
};

use crate::{
    export::{ExportFormat, ExportOptions, ResolutionScale, raster::export_raster},
    resolve::{ImageResolver, decode::encode_data_url},
    surface::SurfaceError,
};

/// Version tag written into every save.
pub const SAVE_FORMAT_VERSION: &str = "1.0";

const SAVE_FAILED: &str = "Failed to save design. Please try again.";
const SAFE_PREVIEW_NOTE: &str =
    "Preview was generated without external images due to browser security restrictions.";

/// The persisted form of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDesign {
    layers: Vec<Layer>,
    canvas_size: CanvasSize,
    background_color: String,
    version: String,
    created_at: DateTime<Utc>,
}

impl SavedDesign {
    /// Snapshots `design`, redacting every non-embedded image reference.
    pub fn from_design(design: &Design) -> Self {
        let layers = design
            .layers()
            .iter()
            .cloned()
            .map(|mut layer| {
                if let LayerKind::Image(image) = layer.kind_mut() {
                    if let Some(token) = ImageReference::parse(image.src()).redacted() {
                        image.set_src(token);
                    }
                }
                layer
            })
            .collect();

        Self {
            layers,
            canvas_size: design.canvas_size(),
            background_color: design.background_color().to_string(),
            version: SAVE_FORMAT_VERSION.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Rebuilds an editable design. Redacted images resolve to placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::DuplicateLayerId`] if two saved layers share an
    /// id.
    pub fn into_design(self) -> Result<Design, DesignError> {
        Design::from_layers(self.layers, self.canvas_size, self.background_color)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// # Errors
    ///
    /// Returns an error if `json` is not a saved design.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Everything handed to the store for one save.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    design: SavedDesign,
    preview: String,
    thumbnail: String,
    product_id: Option<String>,
}

impl SaveRequest {
    pub fn design(&self) -> &SavedDesign {
        &self.design
    }

    /// PNG preview as a `data:` URL.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Currently the same image as the preview.
    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }
}

/// What the store hands back for a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    id: String,
}

impl SaveReceipt {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A store's refusal, with the backend's message when it gave one.
#[derive(Debug, Clone, Default, Error)]
#[error("{}", .message.as_deref().unwrap_or(SAVE_FAILED))]
pub struct StoreError {
    message: Option<String>,
}

impl StoreError {
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }
}

/// Persists saved designs.
#[async_trait]
pub trait DesignStore: Send + Sync {
    async fn save(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError>;
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Add at least one element to your design before saving.")]
    EmptyDesign,

    #[error("{}", .message.as_deref().unwrap_or(SAVE_FAILED))]
    Rejected { message: Option<String> },

    #[error("Unable to render design preview: {0}")]
    Preview(#[from] SurfaceError),

    #[error("Unable to serialize design: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StoreError> for SaveError {
    fn from(err: StoreError) -> Self {
        Self::Rejected {
            message: err.message,
        }
    }
}

/// A completed save.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    receipt: SaveReceipt,
    note: Option<String>,
}

impl SaveOutcome {
    pub fn receipt(&self) -> &SaveReceipt {
        &self.receipt
    }

    /// Set when the preview had to leave out cross-origin images.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

/// Renders a preview and hands the design to `store`.
///
/// The design itself is never modified.
///
/// # Errors
///
/// Returns [`SaveError::EmptyDesign`] for a design without layers,
/// [`SaveError::Preview`] if the preview cannot be rendered and
/// [`SaveError::Rejected`] if the store refuses the save.
pub async fn save_design(
    design: &Design,
    base_image: Option<&ImageReference>,
    product_id: Option<&str>,
    store: &dyn DesignStore,
    resolver: &ImageResolver,
) -> Result<SaveOutcome, SaveError> {
    if design.is_empty() {
        return Err(SaveError::EmptyDesign);
    }

    let options = ExportOptions::new(ExportFormat::Png, ResolutionScale::Standard)
        .with_base_image(base_image.cloned());
    let preview = export_raster(design, &options, resolver).await?;
    let note = preview.degraded.then(|| {
        warn!("Save preview left out cross-origin images");
        SAFE_PREVIEW_NOTE.to_string()
    });

    let preview_url = encode_data_url(ExportFormat::Png.media_type(), &preview.bytes);
    let request = SaveRequest {
        design: SavedDesign::from_design(design),
        thumbnail: preview_url.clone(),
        preview: preview_url,
        product_id: product_id.map(str::to_string),
    };

    let receipt = store.save(&request).await.map_err(|err| {
        warn!(err:err; "Design store rejected save");
        SaveError::from(err)
    })?;
    info!(id = receipt.id(), layers = design.len(); "Design saved");

    Ok(SaveOutcome { receipt, note })
}

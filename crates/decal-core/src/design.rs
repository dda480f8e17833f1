//! The design: an ordered layer list plus canvas metadata.
//!
//! List order is paint order. Index 0 is painted first and ends up
//! bottom-most; the last layer is visually on top. Every structural
//! mutation of the list goes through the methods here.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    geometry::Size,
    identifier::LayerId,
    layer::{Layer, LayerKind},
};

/// Canvas width used when none is configured.
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;

/// Canvas height used when none is configured.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Background color used when none is configured.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// Logical canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the canvas dimensions as a [`Size`].
    pub fn to_size(self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    /// Returns the pixel dimensions of this canvas at `scale`.
    ///
    /// Dimensions are rounded to the nearest pixel and never drop below one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use decal_core::design::CanvasSize;
    /// let canvas = CanvasSize::new(800, 600);
    /// assert_eq!(canvas.scaled(0.75), (600, 450));
    /// assert_eq!(canvas.scaled(1.5), (1200, 900));
    /// ```
    pub fn scaled(self, scale: f32) -> (u32, u32) {
        let scale_dim = |dim: u32| ((dim as f32 * scale).round() as u32).max(1);
        (scale_dim(self.width), scale_dim(self.height))
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

/// A layer list that cannot form a design.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("layer id `{0}` is used more than once")]
    DuplicateLayerId(LayerId),
}

/// An ordered list of layers drawn over a product mockup.
///
/// Layer ids are unique within a design; loading a design with a repeated
/// id fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DesignData")]
pub struct Design {
    layers: Vec<Layer>,
    canvas_size: CanvasSize,
    background_color: String,
}

impl Design {
    /// Creates an empty design.
    pub fn new(canvas_size: CanvasSize, background_color: impl Into<String>) -> Self {
        Self {
            layers: Vec::new(),
            canvas_size,
            background_color: background_color.into(),
        }
    }

    /// Creates a design from existing layers, e.g. a loaded save.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::DuplicateLayerId`] if two layers share an id.
    pub fn from_layers(
        layers: Vec<Layer>,
        canvas_size: CanvasSize,
        background_color: impl Into<String>,
    ) -> Result<Self, DesignError> {
        let duplicate = {
            let mut seen = HashSet::with_capacity(layers.len());
            layers
                .iter()
                .map(Layer::id)
                .find(|id| !seen.insert(*id))
                .cloned()
        };
        if let Some(id) = duplicate {
            return Err(DesignError::DuplicateLayerId(id));
        }

        Ok(Self {
            layers,
            canvas_size,
            background_color: background_color.into(),
        })
    }

    /// Returns all layers in paint order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the layers that will be painted, in paint order.
    pub fn visible_layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter().filter(|layer| layer.is_visible())
    }

    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas_size
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = color.into();
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the number of image layers.
    pub fn image_layer_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|layer| matches!(layer.kind(), LayerKind::Image(_)))
            .count()
    }

    /// Returns the paint-order index of the layer with `id`.
    pub fn position(&self, id: &LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub fn layer_mut(&mut self, id: &LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    /// Appends a layer on top of all others.
    pub fn push(&mut self, layer: Layer) {
        debug!(layer_id = layer.id().as_str(), kind = layer.kind().type_name(); "Adding layer");
        self.layers.push(layer);
    }

    /// Removes and returns the layer with `id`.
    pub fn remove(&mut self, id: &LayerId) -> Option<Layer> {
        let index = self.position(id)?;
        Some(self.layers.remove(index))
    }

    /// Moves the layer one step toward the top of the paint order.
    ///
    /// Returns `false`, leaving the list untouched, if the layer is unknown
    /// or already on top.
    pub fn move_up(&mut self, id: &LayerId) -> bool {
        match self.position(id) {
            Some(index) if index + 1 < self.layers.len() => {
                self.layers.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Moves the layer one step toward the bottom of the paint order.
    ///
    /// Returns `false`, leaving the list untouched, if the layer is unknown
    /// or already at the bottom.
    pub fn move_down(&mut self, id: &LayerId) -> bool {
        match self.position(id) {
            Some(index) if index > 0 => {
                self.layers.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Removes every layer, keeping the canvas metadata.
    pub fn reset(&mut self) {
        debug!(removed = self.layers.len(); "Resetting design");
        self.layers.clear();
    }
}

/// A design as read from JSON, before validation. Extra fields such as a
/// save's `version` are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DesignData {
    layers: Vec<Layer>,
    canvas_size: CanvasSize,
    background_color: String,
}

impl TryFrom<DesignData> for Design {
    type Error = DesignError;

    fn try_from(data: DesignData) -> Result<Self, Self::Error> {
        Design::from_layers(data.layers, data.canvas_size, data.background_color)
    }
}

impl Default for Design {
    fn default() -> Self {
        Self::new(CanvasSize::default(), DEFAULT_BACKGROUND_COLOR)
    }
}

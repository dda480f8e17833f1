//! Design layers.
//!
//! A [`Layer`] is one addressable design element: its base fields (id,
//! position, visibility, creation time) plus a [`LayerKind`] carrying the
//! variant-specific data for text, image and shape layers.
//!
//! # Serialization
//!
//! Layers serialize to the flat JSON objects the save collaborator expects,
//! with the variant selected by a `type` tag:
//!
//! ```json
//! { "id": "layer-…", "type": "text", "x": 10, "y": 10, "visible": true,
//!   "createdAt": "2024-01-01T00:00:00Z", "text": "HI", "color": "#000000",
//!   "fontFamily": "Arial", "fontSize": 24, "fontWeight": "normal" }
//! ```

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    geometry::{Bounds, Point, Size},
    identifier::LayerId,
};

/// Smallest font size a text layer may use.
pub const MIN_FONT_SIZE: u16 = 8;

/// Largest font size a text layer may use.
pub const MAX_FONT_SIZE: u16 = 144;

/// Font weight given to text layers that do not specify one.
pub const DEFAULT_FONT_WEIGHT: &str = "normal";

/// A layer that breaks the layer model's rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("text layer has no text")]
    EmptyText,
}

fn default_visible() -> bool {
    true
}

fn default_font_weight() -> String {
    DEFAULT_FONT_WEIGHT.to_string()
}

/// One design element with its position and paint-order identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    id: LayerId,
    x: f32,
    y: f32,
    #[serde(default = "default_visible")]
    visible: bool,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    kind: LayerKind,
}

impl Layer {
    /// Creates a visible layer with a freshly generated id at `position`.
    pub fn new(kind: LayerKind, position: Point) -> Self {
        Self {
            id: LayerId::generate(),
            x: position.x(),
            y: position.y(),
            visible: true,
            created_at: Utc::now(),
            kind,
        }
    }

    /// Replaces the generated id, for layers rebuilt from external data.
    pub fn with_id(mut self, id: LayerId) -> Self {
        self.id = id;
        self
    }

    /// Returns the layer id.
    pub fn id(&self) -> &LayerId {
        &self.id
    }

    /// Returns the top-left origin of the layer.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Moves the layer so its top-left origin is at `position`.
    ///
    /// No clamping is applied; layers may sit partially or fully outside
    /// the canvas.
    pub fn set_position(&mut self, position: Point) {
        self.x = position.x();
        self.y = position.y();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the variant-specific data.
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Returns mutable access to the variant-specific data.
    pub fn kind_mut(&mut self) -> &mut LayerKind {
        &mut self.kind
    }

    /// Returns the layer's explicit size, if its variant stores one.
    ///
    /// Image and shape layers carry their own width and height. Text layers
    /// do not: their extent is only known once the text has been measured.
    pub fn explicit_size(&self) -> Option<Size> {
        match &self.kind {
            LayerKind::Text(_) => None,
            LayerKind::Image(image) => Some(Size::new(image.width as f32, image.height as f32)),
            LayerKind::Shape(shape) => Some(Size::new(shape.width, shape.height)),
        }
    }

    /// Returns the layer's bounding box using `size` for its extent.
    pub fn bounds_with_size(&self, size: Size) -> Bounds {
        Bounds::new_from_top_left(self.position(), size)
    }
}

/// The variant-specific part of a [`Layer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerKind {
    Text(TextLayer),
    Image(ImageLayer),
    Shape(ShapeLayer),
}

impl LayerKind {
    /// Returns the serialized tag of this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Shape(_) => "shape",
        }
    }
}

/// Text content drawn with a single font and color.
///
/// Loading enforces the constructor's rules: blank text is refused and the
/// font size is clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TextLayerData")]
pub struct TextLayer {
    text: String,
    color: String,
    font_family: String,
    font_size: u16,
    #[serde(default = "default_font_weight")]
    font_weight: String,
}

impl TextLayer {
    /// Creates a text layer with the default font weight.
    ///
    /// `font_size` is clamped to [`MIN_FONT_SIZE`]..=[`MAX_FONT_SIZE`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use decal_core::layer::TextLayer;
    /// let text = TextLayer::new("HI", "#000000", "Arial", 400);
    /// assert_eq!(text.font_size(), 144);
    /// assert_eq!(text.font_weight(), "normal");
    /// ```
    pub fn new(
        text: impl Into<String>,
        color: impl Into<String>,
        font_family: impl Into<String>,
        font_size: u16,
    ) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
            font_family: font_family.into(),
            font_size: clamp_font_size(font_size),
            font_weight: default_font_weight(),
        }
    }

    /// Sets the font weight (builder style).
    pub fn with_font_weight(mut self, weight: impl Into<String>) -> Self {
        self.font_weight = weight.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_size(&self) -> u16 {
        self.font_size
    }

    pub fn font_weight(&self) -> &str {
        &self.font_weight
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn set_font_family(&mut self, family: impl Into<String>) {
        self.font_family = family.into();
    }

    /// Sets the font size, clamped to the supported range.
    pub fn set_font_size(&mut self, size: u16) {
        self.font_size = clamp_font_size(size);
    }

    pub fn set_font_weight(&mut self, weight: impl Into<String>) {
        self.font_weight = weight.into();
    }
}

fn clamp_font_size(size: u16) -> u16 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// A text layer as read from JSON, before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextLayerData {
    text: String,
    color: String,
    font_family: String,
    font_size: u16,
    #[serde(default = "default_font_weight")]
    font_weight: String,
}

impl TryFrom<TextLayerData> for TextLayer {
    type Error = LayerError;

    fn try_from(data: TextLayerData) -> Result<Self, Self::Error> {
        if data.text.trim().is_empty() {
            return Err(LayerError::EmptyText);
        }
        Ok(TextLayer::new(data.text, data.color, data.font_family, data.font_size)
            .with_font_weight(data.font_weight))
    }
}

/// A bitmap drawn stretched into its box.
///
/// `src` is either an embedded `data:` URL or a remote URL; see
/// [`ImageReference`](crate::image_ref::ImageReference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    src: String,
    width: u32,
    height: u32,
}

impl ImageLayer {
    /// Creates an image layer. Zero dimensions are raised to one pixel.
    pub fn new(src: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_src(&mut self, src: impl Into<String>) {
        self.src = src.into();
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }
}

/// The geometric primitive a shape layer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rectangle" | "rect" => Ok(Self::Rectangle),
            "circle" => Ok(Self::Circle),
            _ => Err(format!(
                "invalid shape `{s}`, valid values: rectangle, circle"
            )),
        }
    }
}

/// A filled rectangle or inscribed circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeLayer {
    shape: ShapeKind,
    width: f32,
    height: f32,
    fill_color: String,
}

impl ShapeLayer {
    pub fn new(shape: ShapeKind, width: f32, height: f32, fill_color: impl Into<String>) -> Self {
        Self {
            shape,
            width,
            height,
            fill_color: fill_color.into(),
        }
    }

    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn fill_color(&self) -> &str {
        &self.fill_color
    }

    pub fn set_fill_color(&mut self, color: impl Into<String>) {
        self.fill_color = color.into();
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

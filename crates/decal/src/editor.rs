//! The editor facade.
//!
//! [`Editor`] owns a design together with everything needed to edit, preview,
//! export and save it. Every mutation raises a redraw request and advances the
//! redraw generation; a preview render only commits while its generation is
//! still current, so a slow render can never overwrite a newer one.
//!
//! # Overview
//!
//! - [`Editor`] - Design state and the operations on it.
//! - [`TextStyle`] / [`TextUpdate`] - Text layer attributes on insert and edit.
//! - [`PreviewJob`] / [`RenderedPreview`] - A detached preview render.
//! - [`EditError`] - Rejected edits.

use std::{collections::HashMap, sync::Arc};

use log::{debug, info};
use thiserror::Error;

use decal_core::{
    design::{CanvasSize, DEFAULT_BACKGROUND_COLOR, Design},
    geometry::{Point, Size},
    identifier::LayerId,
    image_ref::ImageReference,
    layer::{ImageLayer, Layer, LayerKind, ShapeKind, ShapeLayer, TextLayer},
};

use crate::{
    DecalError,
    compose::{SceneReport, render_scene},
    config::{AppConfig, CustomizationConfig},
    export::{Artifact, ExportError, ExportFormat, ExportOptions, ResolutionScale, export_design},
    interaction::Interaction,
    persist::{DesignStore, SaveError, SaveOutcome, save_design},
    resolve::ImageResolver,
    surface::{RasterSurface, SurfaceError},
    upload::{Upload, UploadError, prepare},
};

/// Where new layers are placed.
const INSERT_POSITION: Point = Point::new(50.0, 50.0);

/// Why an edit was refused. The design is unchanged in every case.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Please enter some text.")]
    EmptyText,

    #[error("Text must be {max} characters or fewer.")]
    TextTooLong { max: usize },

    #[error("The font `{0}` is not available for this product.")]
    FontNotAllowed(String),

    #[error("The color `{0}` is not available for this product.")]
    ColorNotAllowed(String),

    #[error("You can add at most {max} images.")]
    TooManyImages { max: usize },

    #[error("Shapes need a positive width and height.")]
    InvalidSize,

    #[error("No layer with id `{0}`.")]
    UnknownLayer(LayerId),

    #[error("Layer `{0}` is not a text layer.")]
    NotAText(LayerId),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Attributes of a new text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    color: String,
    font_family: String,
    font_size: u16,
    font_weight: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            font_family: "Arial".to_string(),
            font_size: 24,
            font_weight: "normal".to_string(),
        }
    }
}

impl TextStyle {
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_font_size(mut self, size: u16) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_font_weight(mut self, weight: impl Into<String>) -> Self {
        self.font_weight = weight.into();
        self
    }
}

/// A partial edit of a text layer; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextUpdate {
    text: Option<String>,
    color: Option<String>,
    font_family: Option<String>,
    font_size: Option<u16>,
    font_weight: Option<String>,
}

impl TextUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn font_size(mut self, size: u16) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn font_weight(mut self, weight: impl Into<String>) -> Self {
        self.font_weight = Some(weight.into());
        self
    }
}

/// A preview render detached from the editor.
///
/// Created by [`Editor::begin_preview`]; owns a snapshot of everything it
/// draws, so the editor stays free to change while it runs.
#[derive(Debug)]
pub struct PreviewJob {
    generation: u64,
    design: Design,
    base_image: Option<ImageReference>,
    selected: Option<LayerId>,
    resolver: Arc<ImageResolver>,
}

impl PreviewJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Composites the snapshot into a fresh surface.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Allocation`] if the surface cannot be created.
    pub async fn run(self) -> Result<RenderedPreview, SurfaceError> {
        let canvas = self.design.canvas_size();
        let mut surface = RasterSurface::new(canvas.width, canvas.height)?;
        let report = render_scene(
            &mut surface,
            &self.design,
            self.base_image.as_ref(),
            self.selected.as_ref(),
            &self.resolver,
        )
        .await;
        Ok(RenderedPreview {
            generation: self.generation,
            surface,
            report,
        })
    }
}

/// The result of a [`PreviewJob`], waiting to be committed.
#[derive(Debug)]
pub struct RenderedPreview {
    generation: u64,
    surface: RasterSurface,
    report: SceneReport,
}

impl RenderedPreview {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn report(&self) -> &SceneReport {
        &self.report
    }
}

/// An editable design with its preview, selection and collaborators.
#[derive(Debug)]
pub struct Editor {
    design: Design,
    interaction: Interaction,
    customization: CustomizationConfig,
    jpeg_quality: f32,
    resolver: Arc<ImageResolver>,
    base_image: Option<ImageReference>,
    product_name: Option<String>,
    preview: RasterSurface,
    text_sizes: HashMap<LayerId, Size>,
    redraw: bool,
    generation: u64,
}

impl Editor {
    /// Creates an editor with an empty design on a `canvas`-sized surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub fn new(
        config: &AppConfig,
        resolver: Arc<ImageResolver>,
        canvas: CanvasSize,
    ) -> Result<Self, DecalError> {
        Self::with_design(config, resolver, Design::new(canvas, DEFAULT_BACKGROUND_COLOR))
    }

    /// Creates an editor for an existing design, e.g. a loaded save.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub fn with_design(
        config: &AppConfig,
        resolver: Arc<ImageResolver>,
        design: Design,
    ) -> Result<Self, DecalError> {
        let canvas = design.canvas_size();
        let preview = RasterSurface::new(canvas.width, canvas.height)?;
        Ok(Self {
            design,
            interaction: Interaction::new(),
            customization: config.customization().clone(),
            jpeg_quality: config.export().jpeg_quality(),
            resolver,
            base_image: None,
            product_name: None,
            preview,
            text_sizes: HashMap::new(),
            redraw: true,
            generation: 0,
        })
    }

    /// Sets the product mockup drawn under the layers.
    pub fn set_base_image(&mut self, base_image: Option<ImageReference>) {
        self.base_image = base_image;
        self.request_redraw();
    }

    /// Sets the product name used in export file names.
    pub fn set_product_name(&mut self, product_name: Option<String>) {
        self.product_name = product_name;
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn selected(&self) -> Option<&LayerId> {
        self.interaction.selected()
    }

    /// The last committed preview.
    pub fn preview(&self) -> &RasterSurface {
        &self.preview
    }

    /// Measured text sizes from the last committed preview.
    pub fn text_sizes(&self) -> &HashMap<LayerId, Size> {
        &self.text_sizes
    }

    /// Returns `true` once every image of the current scene has loaded.
    pub fn is_ready(&self) -> bool {
        self.resolver.progress().is_ready()
    }

    // Layer CRUD

    /// Adds a text layer and selects it.
    ///
    /// # Errors
    ///
    /// Rejects empty or over-long text and fonts or colors outside the
    /// configured lists.
    pub fn add_text(&mut self, text: &str, style: TextStyle) -> Result<LayerId, EditError> {
        let text = self.validate_text(text)?;
        self.validate_font(&style.font_family)?;
        self.validate_color(&style.color)?;

        let layer = TextLayer::new(text, style.color, style.font_family, style.font_size)
            .with_font_weight(style.font_weight);
        Ok(self.insert(LayerKind::Text(layer)))
    }

    /// Validates an uploaded file and adds it as an image layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::TooManyImages`] at the image limit and
    /// [`EditError::Upload`] if the file is refused.
    pub fn add_image(&mut self, upload: &Upload) -> Result<LayerId, EditError> {
        self.check_image_limit()?;
        let prepared = prepare(upload)?;
        let layer = ImageLayer::new(prepared.src(), prepared.width(), prepared.height());
        Ok(self.insert(LayerKind::Image(layer)))
    }

    /// Adds an image layer for an existing reference.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::TooManyImages`] at the image limit.
    pub fn add_image_src(
        &mut self,
        src: &str,
        width: u32,
        height: u32,
    ) -> Result<LayerId, EditError> {
        self.check_image_limit()?;
        Ok(self.insert(LayerKind::Image(ImageLayer::new(src, width, height))))
    }

    /// Adds a shape layer.
    ///
    /// # Errors
    ///
    /// Rejects non-positive sizes and colors outside the configured palette.
    pub fn add_shape(
        &mut self,
        shape: ShapeKind,
        width: f32,
        height: f32,
        color: &str,
    ) -> Result<LayerId, EditError> {
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(EditError::InvalidSize);
        }
        self.validate_color(color)?;
        Ok(self.insert(LayerKind::Shape(ShapeLayer::new(shape, width, height, color))))
    }

    /// Applies `update` to a text layer. Nothing changes if any field is
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`], [`EditError::NotAText`] or the
    /// validation error of the first refused field.
    pub fn update_text(&mut self, id: &LayerId, update: TextUpdate) -> Result<(), EditError> {
        let layer = self
            .design
            .layer(id)
            .ok_or_else(|| EditError::UnknownLayer(id.clone()))?;
        if !matches!(layer.kind(), LayerKind::Text(_)) {
            return Err(EditError::NotAText(id.clone()));
        }

        let text = update
            .text
            .as_deref()
            .map(|text| self.validate_text(text))
            .transpose()?;
        if let Some(family) = &update.font_family {
            self.validate_font(family)?;
        }
        if let Some(color) = &update.color {
            self.validate_color(color)?;
        }

        if let Some(LayerKind::Text(layer)) = self.design.layer_mut(id).map(Layer::kind_mut) {
            if let Some(text) = text {
                layer.set_text(text);
            }
            if let Some(color) = update.color {
                layer.set_color(color);
            }
            if let Some(family) = update.font_family {
                layer.set_font_family(family);
            }
            if let Some(size) = update.font_size {
                layer.set_font_size(size);
            }
            if let Some(weight) = update.font_weight {
                layer.set_font_weight(weight);
            }
        }
        self.text_sizes.remove(id);
        self.request_redraw();
        Ok(())
    }

    /// Moves a layer's top-left corner to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn update_layer_position(&mut self, id: &LayerId, position: Point) -> Result<(), EditError> {
        self.layer_mut(id)?.set_position(position);
        self.request_redraw();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn set_visible(&mut self, id: &LayerId, visible: bool) -> Result<(), EditError> {
        self.layer_mut(id)?.set_visible(visible);
        self.request_redraw();
        Ok(())
    }

    /// Removes a layer, clearing the selection if it pointed at it.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn remove_layer(&mut self, id: &LayerId) -> Result<Layer, EditError> {
        let layer = self
            .design
            .remove(id)
            .ok_or_else(|| EditError::UnknownLayer(id.clone()))?;
        self.interaction.forget(id);
        self.text_sizes.remove(id);
        self.request_redraw();
        Ok(layer)
    }

    /// Moves a layer one step up the paint order. Returns `false` if it was
    /// already on top.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn move_layer_up(&mut self, id: &LayerId) -> Result<bool, EditError> {
        self.ensure_layer(id)?;
        let moved = self.design.move_up(id);
        if moved {
            self.request_redraw();
        }
        Ok(moved)
    }

    /// Moves a layer one step down the paint order. Returns `false` if it was
    /// already at the bottom.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn move_layer_down(&mut self, id: &LayerId) -> Result<bool, EditError> {
        self.ensure_layer(id)?;
        let moved = self.design.move_down(id);
        if moved {
            self.request_redraw();
        }
        Ok(moved)
    }

    /// Removes every layer and clears the selection.
    pub fn reset(&mut self) {
        info!(layers = self.design.len(); "Resetting design");
        self.design.reset();
        self.interaction.select(None);
        self.text_sizes.clear();
        self.request_redraw();
    }

    /// # Errors
    ///
    /// Returns [`EditError::UnknownLayer`] if `id` is not in the design.
    pub fn select(&mut self, id: Option<LayerId>) -> Result<(), EditError> {
        if let Some(id) = &id {
            self.ensure_layer(id)?;
        }
        self.interaction.select(id);
        self.request_redraw();
        Ok(())
    }

    // Pointer events

    pub fn pointer_down(&mut self, point: Point) -> Option<LayerId> {
        let hit = self
            .interaction
            .pointer_down(&self.design, point, &self.text_sizes);
        self.request_redraw();
        hit
    }

    pub fn pointer_move(&mut self, point: Point) -> bool {
        let moved = self.interaction.pointer_move(&mut self.design, point);
        if moved {
            self.request_redraw();
        }
        moved
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    // Rendering

    /// Returns and clears the pending redraw request.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// The redraw generation; advanced by every change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshots the current state into a preview render.
    pub fn begin_preview(&self) -> PreviewJob {
        PreviewJob {
            generation: self.generation,
            design: self.design.clone(),
            base_image: self.base_image.clone(),
            selected: self.interaction.selected().cloned(),
            resolver: Arc::clone(&self.resolver),
        }
    }

    /// Installs `rendered` as the preview unless a newer change superseded
    /// it. Returns `true` if it was committed.
    pub fn commit_preview(&mut self, rendered: RenderedPreview) -> bool {
        if rendered.generation != self.generation {
            debug!(
                rendered = rendered.generation,
                current = self.generation;
                "Discarding stale preview"
            );
            return false;
        }
        self.preview = rendered.surface;
        self.text_sizes = rendered.report.into_text_sizes();
        true
    }

    /// Renders and commits the preview for the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub async fn render_preview(&mut self) -> Result<bool, DecalError> {
        self.redraw = false;
        let rendered = self.begin_preview().run().await?;
        Ok(self.commit_preview(rendered))
    }

    /// Exports the current design.
    ///
    /// # Errors
    ///
    /// See [`export_design`].
    pub async fn export(
        &self,
        format: ExportFormat,
        scale: ResolutionScale,
    ) -> Result<Artifact, ExportError> {
        let options = ExportOptions::new(format, scale)
            .with_base_image(self.base_image.clone())
            .with_product_name(self.product_name.clone())
            .with_jpeg_quality(self.jpeg_quality);
        export_design(&self.design, &options, &self.resolver).await
    }

    /// Saves the current design through `store`.
    ///
    /// # Errors
    ///
    /// See [`save_design`].
    pub async fn save(
        &self,
        store: &dyn DesignStore,
        product_id: Option<&str>,
    ) -> Result<SaveOutcome, SaveError> {
        save_design(
            &self.design,
            self.base_image.as_ref(),
            product_id,
            store,
            &self.resolver,
        )
        .await
    }

    fn request_redraw(&mut self) {
        self.redraw = true;
        self.generation += 1;
    }

    fn insert(&mut self, kind: LayerKind) -> LayerId {
        let layer = Layer::new(kind, INSERT_POSITION);
        let id = layer.id().clone();
        self.design.push(layer);
        self.interaction.select(Some(id.clone()));
        self.request_redraw();
        id
    }

    fn ensure_layer(&self, id: &LayerId) -> Result<(), EditError> {
        self.design
            .layer(id)
            .map(|_| ())
            .ok_or_else(|| EditError::UnknownLayer(id.clone()))
    }

    fn layer_mut(&mut self, id: &LayerId) -> Result<&mut Layer, EditError> {
        self.design
            .layer_mut(id)
            .ok_or_else(|| EditError::UnknownLayer(id.clone()))
    }

    fn check_image_limit(&self) -> Result<(), EditError> {
        let max = self.customization.max_images();
        if self.design.image_layer_count() >= max {
            return Err(EditError::TooManyImages { max });
        }
        Ok(())
    }

    fn validate_text<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EditError::EmptyText);
        }
        let max = self.customization.max_text_length();
        if text.chars().count() > max {
            return Err(EditError::TextTooLong { max });
        }
        Ok(text)
    }

    fn validate_font(&self, family: &str) -> Result<(), EditError> {
        if self.customization.is_font_allowed(family) {
            Ok(())
        } else {
            Err(EditError::FontNotAllowed(family.to_string()))
        }
    }

    fn validate_color(&self, color: &str) -> Result<(), EditError> {
        if self.customization.is_color_allowed(color) {
            Ok(())
        } else {
            Err(EditError::ColorNotAllowed(color.to_string()))
        }
    }
}

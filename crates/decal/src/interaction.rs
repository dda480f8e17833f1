//! Pointer handling: hit-testing, selection and drag-to-move.
//!
//! Points are in logical canvas units. Dragging moves the layer by keeping
//! the offset between the pointer and the layer origin fixed; positions are
//! not clamped, so a layer may be dragged partly off the canvas.

use std::collections::HashMap;

use log::debug;

use decal_core::{
    design::Design,
    geometry::{Point, Size},
    identifier::LayerId,
};

use crate::compose::layer_extent;

/// Returns the topmost visible layer under `point`.
///
/// Layers are tested in reverse paint order with inclusive edges. Text
/// layers use their size from `text_sizes` when known and the default
/// extent otherwise.
pub fn hit_test(
    design: &Design,
    point: Point,
    text_sizes: &HashMap<LayerId, Size>,
) -> Option<LayerId> {
    design
        .visible_layers()
        .rev()
        .find(|layer| layer_extent(layer, text_sizes.get(layer.id()).copied()).contains(point))
        .map(|layer| layer.id().clone())
}

#[derive(Debug, Clone)]
struct Drag {
    id: LayerId,
    offset: Point,
}

/// Selection and drag state of the canvas.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    selected: Option<LayerId>,
    drag: Option<Drag>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&LayerId> {
        self.selected.as_ref()
    }

    /// Replaces the selection and cancels any drag.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id;
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Selects the layer under `point` and starts dragging it. A miss clears
    /// the selection.
    pub fn pointer_down(
        &mut self,
        design: &Design,
        point: Point,
        text_sizes: &HashMap<LayerId, Size>,
    ) -> Option<LayerId> {
        let hit = hit_test(design, point, text_sizes);
        self.drag = hit.as_ref().and_then(|id| {
            let layer = design.layer(id)?;
            Some(Drag {
                id: id.clone(),
                offset: point.sub_point(layer.position()),
            })
        });
        debug!(layer_id:? = hit.as_ref().map(LayerId::as_str); "Pointer down");
        self.selected = hit.clone();
        hit
    }

    /// Moves the dragged layer so it keeps its offset to `point`.
    ///
    /// Returns `true` if a layer moved.
    pub fn pointer_move(&mut self, design: &mut Design, point: Point) -> bool {
        let Some(drag) = &self.drag else {
            return false;
        };
        match design.layer_mut(&drag.id) {
            Some(layer) => {
                layer.set_position(point.sub_point(drag.offset));
                true
            }
            None => {
                self.drag = None;
                false
            }
        }
    }

    /// Ends any drag. The selection stays.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Drops selection and drag state that refers to a removed layer.
    pub fn forget(&mut self, id: &LayerId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.drag.as_ref().is_some_and(|drag| &drag.id == id) {
            self.drag = None;
        }
    }
}

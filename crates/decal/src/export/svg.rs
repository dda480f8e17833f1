//! Vector export.
//!
//! The document is sized to the logical canvas. Nodes are collected per
//! [`RenderLayer`] and emitted as `<g data-layer="...">` groups, bottom to
//! top. Image layers have no vector form and are left out.

use svg::{
    Document,
    node::element::{Circle, Group, Rectangle, Text},
};

use decal_core::{
    design::Design,
    layer::{Layer, LayerKind, ShapeKind, ShapeLayer, TextLayer},
};

use crate::surface::text::parse_weight;

/// Type alias for boxed SVG nodes.
pub type SvgNode = Box<dyn svg::Node>;

/// Fill of the background rectangle; exports are always on white.
const BACKGROUND_FILL: &str = "#ffffff";

/// Output groups, bottom to top in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    Background,
    Content,
}

impl RenderLayer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Content => "content",
        }
    }
}

/// SVG nodes tagged with the group they belong to.
///
/// # Example
///
/// ```
/// # use decal::export::svg::{LayeredOutput, RenderLayer};
/// # use svg::node::element::Rectangle;
/// let mut output = LayeredOutput::new();
/// output.add_to_layer(RenderLayer::Content, Box::new(Rectangle::new()));
/// output.add_to_layer(RenderLayer::Background, Box::new(Rectangle::new()));
///
/// // One group per non-empty layer.
/// assert_eq!(output.render().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct LayeredOutput {
    items: Vec<(RenderLayer, SvgNode)>,
}

impl LayeredOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_layer(&mut self, layer: RenderLayer, node: SvgNode) {
        self.items.push((layer, node));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the output and returns one `<g>` per non-empty layer.
    ///
    /// Sorting is stable, so nodes keep their insertion order within a layer.
    pub fn render(mut self) -> Vec<SvgNode> {
        self.items.sort_by_key(|(layer, _)| *layer);

        let mut result = Vec::new();
        let mut current: Option<(RenderLayer, Group)> = None;

        for (layer, node) in self.items {
            current = match current {
                Some((current_layer, group)) if current_layer == layer => {
                    Some((current_layer, group.add(node)))
                }
                previous => {
                    if let Some((_, group)) = previous {
                        result.push(Box::new(group) as SvgNode);
                    }
                    let group = Group::new().set("data-layer", layer.name());
                    Some((layer, group.add(node)))
                }
            };
        }

        if let Some((_, group)) = current {
            result.push(Box::new(group) as SvgNode);
        }
        result
    }
}

/// Builds the SVG document for `design`.
pub fn render_svg(design: &Design) -> Document {
    let canvas = design.canvas_size();
    let mut output = LayeredOutput::new();

    let background = Rectangle::new()
        .set("x", 0)
        .set("y", 0)
        .set("width", canvas.width)
        .set("height", canvas.height)
        .set("fill", BACKGROUND_FILL);
    output.add_to_layer(RenderLayer::Background, Box::new(background));

    for layer in design.visible_layers() {
        if let Some(node) = layer_node(layer) {
            output.add_to_layer(RenderLayer::Content, node);
        }
    }

    output.render().into_iter().fold(
        Document::new()
            .set("width", canvas.width)
            .set("height", canvas.height)
            .set("viewBox", format!("0 0 {} {}", canvas.width, canvas.height)),
        |doc, group| doc.add(group),
    )
}

fn layer_node(layer: &Layer) -> Option<SvgNode> {
    match layer.kind() {
        LayerKind::Text(text) => Some(Box::new(text_node(layer, text))),
        LayerKind::Shape(shape) => Some(shape_node(layer, shape)),
        LayerKind::Image(_) => None,
    }
}

fn text_node(layer: &Layer, text: &TextLayer) -> Text {
    let position = layer.position();
    Text::new(text.text())
        .set("x", position.x())
        .set("y", position.y())
        .set("font-family", text.font_family())
        .set("font-size", text.font_size())
        .set("font-weight", parse_weight(text.font_weight()))
        .set("fill", text.color())
        .set("dominant-baseline", "hanging")
}

fn shape_node(layer: &Layer, shape: &ShapeLayer) -> SvgNode {
    let position = layer.position();
    match shape.shape() {
        ShapeKind::Rectangle => Box::new(
            Rectangle::new()
                .set("x", position.x())
                .set("y", position.y())
                .set("width", shape.width())
                .set("height", shape.height())
                .set("fill", shape.fill_color()),
        ),
        ShapeKind::Circle => Box::new(
            Circle::new()
                .set("cx", position.x() + shape.width() / 2.0)
                .set("cy", position.y() + shape.height() / 2.0)
                .set("r", shape.width() / 2.0)
                .set("fill", shape.fill_color()),
        ),
    }
}

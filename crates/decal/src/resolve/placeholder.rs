//! Stand-in bitmaps for images that could not be loaded.
//!
//! The preferred placeholder is a small SVG card rendered through `resvg`.
//! Should that fail (no SVG support, no fonts, a broken document) a plain
//! procedural card is painted instead. The procedural path has no external
//! inputs and always produces a bitmap.

use log::warn;
use svg::{
    Document,
    node::element::{Rectangle, Text},
};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::decode::{DecodeError, render_svg};
use crate::surface::{Font, TextManager};

/// Edge length of a placeholder bitmap, in pixels.
pub const PLACEHOLDER_SIZE: u32 = 200;

/// Label shown on placeholders for images that failed to load.
pub const UNAVAILABLE_LABEL: &str = "Image unavailable";

const CARD_FILL: &str = "#f3f4f6";
const CARD_BORDER: &str = "#9ca3af";
const LABEL_COLOR: &str = "#6b7280";
const LABEL_SIZE: f32 = 14.0;

/// Returns a placeholder bitmap carrying `label`.
pub fn placeholder(label: &str) -> Pixmap {
    match svg_placeholder(label) {
        Ok(pixmap) => pixmap,
        Err(err) => {
            warn!(err:err; "SVG placeholder failed, painting a plain one");
            procedural_placeholder(label)
        }
    }
}

/// Builds the placeholder card as an SVG document.
pub fn placeholder_document(label: &str) -> Document {
    let size = PLACEHOLDER_SIZE as f32;
    let card = Rectangle::new()
        .set("x", 1)
        .set("y", 1)
        .set("width", size - 2.0)
        .set("height", size - 2.0)
        .set("fill", CARD_FILL)
        .set("stroke", CARD_BORDER)
        .set("stroke-width", 2)
        .set("stroke-dasharray", "6 4");
    let text = Text::new(label)
        .set("x", size / 2.0)
        .set("y", size / 2.0)
        .set("text-anchor", "middle")
        .set("dominant-baseline", "middle")
        .set("font-family", "sans-serif")
        .set("font-size", LABEL_SIZE)
        .set("fill", LABEL_COLOR);

    Document::new()
        .set("width", PLACEHOLDER_SIZE)
        .set("height", PLACEHOLDER_SIZE)
        .set("viewBox", (0, 0, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE))
        .add(card)
        .add(text)
}

fn svg_placeholder(label: &str) -> Result<Pixmap, DecodeError> {
    let document = placeholder_document(label);
    render_svg(
        &document.to_string(),
        Some((PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)),
    )
}

fn solid(hex: &str) -> Color {
    crate::surface::parse_color(hex).unwrap_or(Color::BLACK)
}

/// Paints the placeholder card directly: fill, border and label.
pub fn procedural_placeholder(label: &str) -> Pixmap {
    let size = PLACEHOLDER_SIZE as f32;
    let mut pixmap =
        Pixmap::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE).expect("placeholder size is non-zero");
    pixmap.fill(solid(CARD_FILL));

    let mut paint = Paint::default();
    paint.set_color(solid(CARD_BORDER));
    if let Some(border) = Rect::from_xywh(1.0, 1.0, size - 2.0, size - 2.0) {
        let path = PathBuilder::from_rect(border);
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    let font = Font::new("sans-serif", LABEL_SIZE, "normal");
    let text_manager = TextManager::global();
    let measured = text_manager.measure(label, &font);
    text_manager.draw(
        &mut pixmap,
        label,
        &font,
        solid(LABEL_COLOR),
        (size - measured.width()) / 2.0,
        (size - measured.height()) / 2.0,
    );

    pixmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_has_fixed_size() {
        let pixmap = placeholder(UNAVAILABLE_LABEL);
        assert_eq!((pixmap.width(), pixmap.height()), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
    }

    #[test]
    fn test_procedural_placeholder_paints_card_and_border() {
        let pixmap = procedural_placeholder("missing.png");
        let center_top = pixmap.pixel(PLACEHOLDER_SIZE / 2, 10).unwrap();
        assert_eq!(center_top.alpha(), 255);
        assert_eq!(center_top.red(), 0xf3);

        let edge = pixmap.pixel(PLACEHOLDER_SIZE / 2, 1).unwrap();
        assert_eq!(edge.red(), 0x9c);
    }

    #[test]
    fn test_placeholder_document_carries_label() {
        let document = placeholder_document("logo.png").to_string();
        assert!(document.contains("logo.png"));
        assert!(document.contains("viewBox=\"0 0 200 200\""));
    }
}

//! Text shaping, measurement and rasterization.
//!
//! All text goes through one process-wide [`TextManager`] so the expensive
//! `FontSystem` (system font discovery) is built once and reused.

use std::sync::{Mutex, OnceLock, PoisonError};

use cosmic_text::{
    Attrs, Buffer, Color as TextColor, Family, FontSystem, Metrics, Shaping, SwashCache, Weight,
};
use log::info;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

use decal_core::geometry::Size;

/// Line height relative to the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Average glyph advance relative to the font size, used when no font could
/// shape the text.
const FALLBACK_ADVANCE_FACTOR: f32 = 0.55;

/// A resolved font: family, pixel size and numeric weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    family: String,
    size: f32,
    weight: u16,
}

impl Font {
    /// Creates a font from a family name, a size in pixels and a CSS weight
    /// string (`normal`, `bold` or a number).
    pub fn new(family: impl Into<String>, size: f32, weight: &str) -> Self {
        Self {
            family: family.into(),
            size: size.max(1.0),
            weight: parse_weight(weight),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    fn attrs(&self) -> Attrs<'_> {
        let family = match self.family.to_ascii_lowercase().as_str() {
            "sans-serif" => Family::SansSerif,
            "serif" => Family::Serif,
            "monospace" => Family::Monospace,
            _ => Family::Name(&self.family),
        };
        Attrs::new().family(family).weight(Weight(self.weight))
    }

    fn metrics(&self) -> Metrics {
        Metrics::new(self.size, self.size * LINE_HEIGHT_FACTOR)
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::new("sans-serif", 16.0, "normal")
    }
}

/// Maps a CSS font weight string to its numeric value.
///
/// Unknown strings fall back to the normal weight.
pub fn parse_weight(weight: &str) -> u16 {
    match weight.trim().to_ascii_lowercase().as_str() {
        "normal" | "regular" => 400,
        "bold" => 700,
        "lighter" => 300,
        "bolder" => 800,
        other => other
            .parse::<u16>()
            .ok()
            .filter(|w| (1..=1000).contains(w))
            .unwrap_or(400),
    }
}

struct Fonts {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

/// Shared font state behind a mutex.
pub struct TextManager {
    fonts: Mutex<Fonts>,
}

impl TextManager {
    fn new() -> Self {
        info!("Initializing FontSystem");
        Self {
            fonts: Mutex::new(Fonts {
                font_system: FontSystem::new(),
                swash_cache: SwashCache::new(),
            }),
        }
    }

    /// Returns the process-wide instance.
    pub fn global() -> &'static Self {
        static TEXT_MANAGER: OnceLock<TextManager> = OnceLock::new();
        TEXT_MANAGER.get_or_init(TextManager::new)
    }

    /// Measures a single line of text.
    ///
    /// Width is the advance of the shaped line; height is the font size.
    pub fn measure(&self, text: &str, font: &Font) -> Size {
        if text.is_empty() {
            return Size::default();
        }

        let mut guard = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
        let fonts = &mut *guard;

        let mut buffer = Buffer::new(&mut fonts.font_system, font.metrics());
        let mut buffer = buffer.borrow_with(&mut fonts.font_system);
        buffer.set_size(None, None);
        buffer.set_text(text, &font.attrs(), Shaping::Advanced, None);
        buffer.shape_until_scroll(true);

        let width = shaped_width(&buffer).unwrap_or_else(|| fallback_width(text, font));
        Size::new(width, font.size())
    }

    /// Draws a single line of text with its top-left corner at `(x, y)`.
    ///
    /// Returns the measured size, as [`TextManager::measure`] would.
    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        font: &Font,
        color: Color,
        x: f32,
        y: f32,
    ) -> Size {
        if text.is_empty() {
            return Size::default();
        }

        let mut guard = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
        let fonts = &mut *guard;

        let mut buffer = Buffer::new(&mut fonts.font_system, font.metrics());
        let mut buffer = buffer.borrow_with(&mut fonts.font_system);
        buffer.set_size(None, None);
        buffer.set_text(text, &font.attrs(), Shaping::Advanced, None);
        buffer.shape_until_scroll(true);

        let rgba = color.to_color_u8();
        let text_color = TextColor::rgba(rgba.red(), rgba.green(), rgba.blue(), rgba.alpha());
        let mut paint = Paint::default();
        buffer.draw(&mut fonts.swash_cache, text_color, |gx, gy, w, h, c| {
            if c.a() == 0 {
                return;
            }
            let Some(rect) = Rect::from_xywh(x + gx as f32, y + gy as f32, w as f32, h as f32)
            else {
                return;
            };
            paint.set_color_rgba8(c.r(), c.g(), c.b(), c.a());
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        });

        let width = shaped_width(&buffer).unwrap_or_else(|| fallback_width(text, font));
        Size::new(width, font.size())
    }
}

fn shaped_width(buffer: &Buffer) -> Option<f32> {
    let width = buffer
        .layout_runs()
        .filter_map(|run| run.glyphs.last().map(|glyph| glyph.x + glyph.w))
        .fold(0.0_f32, f32::max);
    (width > 0.0).then_some(width)
}

fn fallback_width(text: &str, font: &Font) -> f32 {
    text.chars().count() as f32 * font.size() * FALLBACK_ADVANCE_FACTOR
}

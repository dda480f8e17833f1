//! Color handling for Decal designs
//!
//! Layers keep their colors as the hex strings the shopper picked; [`Color`]
//! is what those strings are validated and converted through before they
//! reach a raster surface.

use std::str::FromStr;

use color::{DynamicColor, Srgb};

/// Wrapper around the `DynamicColor` type from the color crate
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Color {
    /// Create a new `Color` from a string
    /// This will parse CSS color strings such as "#ff0000", "rgb(255, 0, 0)", "red", etc.
    ///
    /// # Examples
    ///
    /// ```
    /// use decal_core::color::Color;
    ///
    /// assert!(Color::new("#ff0000").is_ok());
    /// assert!(Color::new("not-a-color").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self { color }),
            Err(err) => Err(format!("invalid color `{color_str}`: {err}")),
        }
    }

    /// Converts the color to 8-bit sRGB channels `[r, g, b, a]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use decal_core::color::Color;
    ///
    /// let color = Color::new("#ff8000").unwrap();
    /// assert_eq!(color.to_rgba8(), [255, 128, 0, 255]);
    /// ```
    pub fn to_rgba8(self) -> [u8; 4] {
        let rgba = self.color.to_alpha_color::<Srgb>().to_rgba8();
        [rgba.r, rgba.g, rgba.b, rgba.a]
    }
}

/// Returns `true` if `value` is a `#rgb` or `#rrggbb` hex color string.
///
/// Layer colors are stored as hex strings, so anything else is rejected
/// before it reaches the design.
pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

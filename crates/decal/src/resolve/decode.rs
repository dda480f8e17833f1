//! Turning image bytes into premultiplied pixmaps.
//!
//! Raster formats go through the `image` crate, SVG documents through
//! `resvg`. Embedded `data:` URLs are split and decoded here too, so the
//! resolver never touches the network for them.

use std::sync::{Arc, OnceLock};

use base64::Engine;
use image::RgbaImage;
use log::debug;
use resvg::usvg;
use thiserror::Error;
use tiny_skia::{IntSize, Pixmap, Transform};

/// Largest edge accepted for a decoded bitmap.
pub const MAX_DECODED_DIMENSION: u32 = 8192;

const SVG_MEDIA_TYPE: &str = "image/svg+xml";

/// Reasons a bitmap could not be produced from bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image data is empty")]
    Empty,

    #[error("unable to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("unable to parse SVG: {0}")]
    Svg(String),

    #[error("image dimensions {width}x{height} are not supported")]
    Dimensions { width: u32, height: u32 },
}

/// The payload of a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    media_type: Option<String>,
    bytes: Vec<u8>,
}

impl DataUrl {
    /// Splits and decodes a `data:[<media type>][;base64],<data>` URL.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDataUrl`] when the prefix or the comma is
    /// missing or a percent escape is malformed, and
    /// [`DecodeError::Base64`] when a base64 payload does not decode.
    pub fn parse(src: &str) -> Result<Self, DecodeError> {
        let rest = src
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| DecodeError::InvalidDataUrl("missing `data:` prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DecodeError::InvalidDataUrl("missing comma".to_string()))?;

        let mut params = header.split(';');
        let media_type = params
            .next()
            .filter(|value| value.contains('/'))
            .map(str::to_ascii_lowercase);
        let is_base64 = params.any(|param| param.eq_ignore_ascii_case("base64"));

        let bytes = if is_base64 {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD.decode(compact)?
        } else {
            percent_decode(payload)?
        };

        Ok(Self { media_type, bytes })
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encodes bytes as a base64 `data:` URL.
pub fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{media_type};base64,{payload}")
}

fn percent_decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escape = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| DecodeError::InvalidDataUrl("incomplete percent escape".to_string()))?;
        let hex = std::str::from_utf8(escape)
            .ok()
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .ok_or_else(|| DecodeError::InvalidDataUrl("invalid percent escape".to_string()))?;
        out.push(hex);
        i += 3;
    }

    Ok(out)
}

/// Decodes image bytes into a premultiplied pixmap at natural size.
///
/// `media_type` is a hint; SVG documents are also recognized by content.
pub fn decode_pixmap(bytes: &[u8], media_type: Option<&str>) -> Result<Pixmap, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    if media_type.is_some_and(|mt| mt.starts_with(SVG_MEDIA_TYPE)) || looks_like_svg(bytes) {
        let text = std::str::from_utf8(bytes).map_err(|err| DecodeError::Svg(err.to_string()))?;
        return render_svg(text, None);
    }

    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    debug!(width = decoded.width(), height = decoded.height(); "Decoded raster image");
    rgba_to_pixmap(decoded)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Converts straight-alpha RGBA into a premultiplied pixmap.
pub fn rgba_to_pixmap(image: RgbaImage) -> Result<Pixmap, DecodeError> {
    let (width, height) = image.dimensions();
    let size = checked_size(width, height)?;

    let mut data = image.into_raw();
    for px in data.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);
        for channel in &mut px[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }

    Pixmap::from_vec(data, size).ok_or(DecodeError::Dimensions { width, height })
}

fn checked_size(width: u32, height: u32) -> Result<IntSize, DecodeError> {
    if width > MAX_DECODED_DIMENSION || height > MAX_DECODED_DIMENSION {
        return Err(DecodeError::Dimensions { width, height });
    }
    IntSize::from_wh(width, height).ok_or(DecodeError::Dimensions { width, height })
}

/// Renders an SVG document, at its intrinsic size or at `target`.
pub fn render_svg(svg: &str, target: Option<(u32, u32)>) -> Result<Pixmap, DecodeError> {
    let mut options = usvg::Options::default();
    options.fontdb = shared_fontdb();

    let tree = usvg::Tree::from_str(svg, &options).map_err(|err| DecodeError::Svg(err.to_string()))?;
    let size = tree.size();
    let (width, height) = target.unwrap_or_else(|| {
        (
            size.width().ceil().max(1.0) as u32,
            size.height().ceil().max(1.0) as u32,
        )
    });
    checked_size(width, height)?;

    let mut pixmap = Pixmap::new(width, height).ok_or(DecodeError::Dimensions { width, height })?;
    let transform = Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Ok(pixmap)
}

/// System fonts for SVG text, loaded once per process.
fn shared_fontdb() -> Arc<usvg::fontdb::Database> {
    static FONTDB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    Arc::clone(FONTDB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(); "Loaded system fonts for SVG rendering");
        Arc::new(db)
    }))
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgba};

    use super::*;

    fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_data_url_base64() {
        let url = encode_data_url("image/png", b"hello");
        let parsed = DataUrl::parse(&url).unwrap();
        assert_eq!(parsed.media_type(), Some("image/png"));
        assert_eq!(parsed.bytes(), b"hello");
    }

    #[test]
    fn test_data_url_percent_encoded() {
        let parsed = DataUrl::parse("data:image/svg+xml,%3Csvg%20a%3D%221%22%3E").unwrap();
        assert_eq!(parsed.media_type(), Some("image/svg+xml"));
        assert_eq!(parsed.bytes(), b"<svg a=\"1\">");
    }

    #[test]
    fn test_data_url_errors() {
        assert!(matches!(
            DataUrl::parse("image/png;base64,AAAA"),
            Err(DecodeError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            DataUrl::parse("data:image/png;base64"),
            Err(DecodeError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            DataUrl::parse("data:image/png;base64,!!!"),
            Err(DecodeError::Base64(_))
        ));
        assert!(matches!(
            DataUrl::parse("data:text/plain,%4"),
            Err(DecodeError::InvalidDataUrl(_))
        ));
    }

    #[test]
    fn test_decode_png_is_premultiplied() {
        let bytes = png_bytes(3, 2, [200, 100, 0, 128]);
        let pixmap = decode_pixmap(&bytes, Some("image/png")).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (3, 2));

        let px = pixmap.pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 100);
        assert_eq!(px.green(), 50);
    }

    #[test]
    fn test_decode_svg_by_content() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
            <rect width="40" height="20" fill="#ff0000"/></svg>"##;
        let pixmap = decode_pixmap(svg, None).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (40, 20));
        assert_eq!(pixmap.pixel(10, 10).unwrap().red(), 255);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_pixmap(&[], None), Err(DecodeError::Empty)));
        assert!(decode_pixmap(b"definitely not an image", Some("image/png")).is_err());
    }
}

//! Validation of user-supplied image files.
//!
//! An accepted upload becomes an embedded `data:` URL, so it never needs a
//! network fetch and never taints a surface.

use std::{fs, path::Path};

use log::info;
use thiserror::Error;

use crate::resolve::decode::{DecodeError, decode_pixmap, encode_data_url};

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Inserted images are scaled down to fit a square of this size.
pub const MAX_INSERT_DIMENSION: u32 = 200;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select an image file.")]
    NotAnImage { media_type: String },

    #[error("Image must be smaller than 5MB.")]
    TooLarge { size: usize },

    #[error("Could not read the image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Could not read the file: {0}")]
    Io(#[from] std::io::Error),
}

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct Upload {
    file_name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads `path`, guessing the media type from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Io`] if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = media_type_for(path).to_string();
        Ok(Self::new(file_name, media_type, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// An upload turned into something an image layer can reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    src: String,
    width: u32,
    height: u32,
    natural_width: u32,
    natural_height: u32,
}

impl PreparedImage {
    /// The embedded `data:` URL.
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Display width after fitting.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.natural_width, self.natural_height)
    }
}

/// Validates `upload` and prepares it for insertion.
///
/// # Errors
///
/// Returns [`UploadError::NotAnImage`] unless the media type starts with
/// `image/`, [`UploadError::TooLarge`] above [`MAX_UPLOAD_BYTES`], and
/// [`UploadError::Decode`] if the bytes are not a readable image.
pub fn prepare(upload: &Upload) -> Result<PreparedImage, UploadError> {
    if !upload.media_type.starts_with("image/") {
        return Err(UploadError::NotAnImage {
            media_type: upload.media_type.clone(),
        });
    }
    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: upload.bytes.len(),
        });
    }

    let pixmap = decode_pixmap(&upload.bytes, Some(upload.media_type.as_str()))?;
    let (natural_width, natural_height) = (pixmap.width(), pixmap.height());
    let (width, height) = fit_within(natural_width, natural_height, MAX_INSERT_DIMENSION);

    info!(
        file_name = upload.file_name.as_str(),
        natural_width,
        natural_height,
        width,
        height;
        "Upload accepted"
    );

    Ok(PreparedImage {
        src: encode_data_url(&upload.media_type, &upload.bytes),
        width,
        height,
        natural_width,
        natural_height,
    })
}

/// Scales `width × height` down to fit in a `max × max` square, keeping the
/// aspect ratio. Never enlarges and never returns zero.
///
/// # Examples
///
/// ```
/// # use decal::upload::fit_within;
/// assert_eq!(fit_within(800, 400, 200), (200, 100));
/// assert_eq!(fit_within(50, 80, 200), (50, 80));
/// ```
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let (width, height) = (width.max(1), height.max(1));
    let ratio = (max as f64 / width as f64)
        .min(max as f64 / height as f64)
        .min(1.0);
    let fit = |dim: u32| ((dim as f64 * ratio).round() as u32).max(1);
    (fit(width), fit(height))
}

//! Captured still images.
//!
//! The camera itself is an external collaborator; this module only models the
//! artifact it produces and checks that the artifact can be submitted to the
//! inference API. Images arrive as files (CLI) or as base64 data URLs
//! (browser screenshots posted to the HTTP API).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// Maximum accepted image size in bytes (20 MiB, the inline-data request limit).
pub const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

/// Image formats accepted by the inference API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image format.
    Png,
    /// JPEG image format.
    Jpeg,
    /// WebP image format.
    Webp,
}

impl ImageFormat {
    /// Attempts to detect image format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Attempts to detect image format from a file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detects the format from the leading magic bytes.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

        if data.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    /// MIME type sent alongside the inline image data.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Webp => write!(f, "webp"),
        }
    }
}

/// Data URL prefix produced by browser webcam screenshots.
#[allow(clippy::unwrap_used)]
fn data_url_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"^data:image/(png|jpeg|webp);base64,").unwrap())
}

/// A single still image yielded by the capture surface.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Detected image format.
    pub format: ImageFormat,

    /// Raw encoded image bytes.
    pub data: Vec<u8>,

    /// Where the image came from, if it was read from disk.
    pub source: Option<PathBuf>,

    /// When the image was handed to the session.
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    /// Builds a captured image from raw encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::InvalidImage` if the bytes are empty, exceed
    /// [`MAX_IMAGE_SIZE`], or are not PNG, JPEG or WebP.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(SentinelError::invalid_image("image is empty"));
        }

        if data.len() as u64 > MAX_IMAGE_SIZE {
            return Err(SentinelError::invalid_image(format!(
                "image is {} bytes, limit is {MAX_IMAGE_SIZE}",
                data.len()
            )));
        }

        let format = ImageFormat::sniff(&data)
            .ok_or_else(|| SentinelError::invalid_image("unrecognized image format"))?;

        Ok(Self {
            format,
            data,
            source: None,
            captured_at: Utc::now(),
        })
    }

    /// Decodes a base64 payload, with or without a `data:image/...;base64,` prefix.
    pub fn from_data_url(encoded: &str) -> Result<Self> {
        let payload = data_url_prefix().replace(encoded.trim(), "");
        let data = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| SentinelError::invalid_image(format!("invalid base64 payload: {e}")))?;
        Self::from_bytes(data)
    }

    /// Reads a captured frame from disk.
    ///
    /// The size limit is checked before the file is read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_IMAGE_SIZE {
            return Err(SentinelError::invalid_image(format!(
                "'{}' is {} bytes, limit is {MAX_IMAGE_SIZE}",
                path.display(),
                metadata.len()
            )));
        }

        let data = std::fs::read(path)?;
        let mut image = Self::from_bytes(data)?;
        image.source = Some(path.to_path_buf());
        Ok(image)
    }

    /// Returns the image as standard base64 for inline request data.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Size of the encoded image in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

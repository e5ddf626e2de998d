//! Preview cache keys and rendered bitmap payloads

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{PreviewError, PreviewResult};

/// Everything that determines the pixels of one rendered preview.
///
/// Any renderer input that changes must produce a different key; entries
/// are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewKey {
    pub external_key: String,
    pub style_marker: String,
    pub text: String,
    pub size: u32,
    pub width: u32,
}

impl PreviewKey {
    /// Build a key, keeping at most `max_text` characters of the preview text
    pub fn new(
        external_key: &str,
        style_marker: &str,
        text: &str,
        size: u32,
        width: u32,
        max_text: usize,
    ) -> Self {
        Self {
            external_key: external_key.to_string(),
            style_marker: style_marker.to_string(),
            text: truncate_chars(text, max_text).to_string(),
            size,
            width,
        }
    }

    /// The request id sent to the helper for this key
    pub fn request_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}::{}::{}",
            self.external_key, self.style_marker, self.text, self.size, self.width
        )
    }
}

/// First `max` characters of `text`, never splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A `data:<mime>;base64,<payload>` bitmap returned by the helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    uri: String,
}

impl PreviewImage {
    /// Wrap a data URI after checking its shape
    pub fn from_data_uri(uri: &str) -> PreviewResult<Self> {
        parse_data_uri(uri)?;
        Ok(Self {
            uri: uri.to_string(),
        })
    }

    pub fn as_data_uri(&self) -> &str {
        &self.uri
    }

    /// MIME type declared by the URI
    pub fn mime_type(&self) -> &str {
        parse_data_uri(&self.uri)
            .map(|(mime, _)| mime)
            .unwrap_or_default()
    }

    /// Decode the base64 payload into raw image bytes
    pub fn decode(&self) -> PreviewResult<Vec<u8>> {
        let (_, payload) = parse_data_uri(&self.uri)?;
        STANDARD
            .decode(payload.trim())
            .map_err(|e| PreviewError::InvalidDataUri {
                message: e.to_string(),
            })
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime_type() {
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }
}

fn parse_data_uri(uri: &str) -> PreviewResult<(&str, &str)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| PreviewError::InvalidDataUri {
            message: "missing data: prefix".to_string(),
        })?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| PreviewError::InvalidDataUri {
        message: "missing payload separator".to_string(),
    })?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| PreviewError::InvalidDataUri {
            message: format!("unsupported encoding in '{}'", header),
        })?;
    if payload.is_empty() {
        return Err(PreviewError::InvalidDataUri {
            message: "empty payload".to_string(),
        });
    }
    Ok((mime, payload))
}

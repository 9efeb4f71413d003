//! Upload validation and storage key naming

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Largest accepted image, in bytes (10MB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image/jpeg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            _ => None,
        }
    }

    /// Parse a MIME string, rejecting anything outside the whitelist
    pub fn parse(s: &str) -> Result<Self, Error> {
        Self::from_str(s).ok_or_else(|| Error::UnsupportedMimeType(s.to_string()))
    }
}

/// Reject declared sizes over the 10MB limit
pub fn check_declared_size(file_size: u64) -> Result<(), Error> {
    if file_size > MAX_UPLOAD_BYTES {
        return Err(Error::FileTooLarge);
    }
    Ok(())
}

/// Decode a base64 image payload, enforcing the size limit on the decoded bytes
pub fn decode_image(image_base64: &str) -> Result<Vec<u8>, Error> {
    // Browsers hand over data URLs; accept them as well as bare base64
    let payload = match image_base64.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image_base64,
    };

    let bytes = STANDARD.decode(payload.trim())?;
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(Error::FileTooLarge);
    }
    Ok(bytes)
}

/// Storage key for an upload: `submissions/{user}/{millis}-{file_name}`
pub fn submission_key(user_id: u64, timestamp_millis: i64, file_name: &str) -> String {
    let safe_name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let safe_name = match safe_name.trim_start_matches('.') {
        "" => "upload".to_string(),
        trimmed => trimmed.to_string(),
    };
    format!("submissions/{}/{}-{}", user_id, timestamp_millis, safe_name)
}

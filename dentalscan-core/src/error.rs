//! Error types for DentalScan core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File size exceeds 10MB limit")]
    FileTooLarge,

    #[error("Unsupported image type: {0} (only image/jpeg and image/png are accepted)")]
    UnsupportedMimeType(String),

    #[error("Invalid image payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

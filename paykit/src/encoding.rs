//! Base64-wrapped JSON, the encoding used by every x402 header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors raised while decoding a base64 JSON header value.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The value is not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not the expected JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes `value` to JSON and wraps it in standard base64.
///
/// # Errors
///
/// Returns [`EncodingError::Json`] if serialization fails.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodingError> {
    let json = serde_json::to_vec(value)?;
    Ok(b64.encode(json))
}

/// Unwraps standard base64 and deserializes the JSON inside.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`EncodingError`] if the value is not base64 or not the expected JSON.
pub fn decode_json<T: DeserializeOwned>(encoded: &str) -> Result<T, EncodingError> {
    let bytes = b64.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

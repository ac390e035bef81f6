//! Error types for the HTTP layer.
//!
//! These never escape the engines: [`crate::negotiation`] and [`crate::auth`]
//! fold them into phase-tagged results.

use paykit::NormalizeError;
use paykit::encoding::EncodingError;

/// Errors while encoding or decoding x402 headers.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Base64 or JSON failure inside a header value.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Raw JSON header could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The encoded value is not a legal header value.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The received header is not visible ASCII.
    #[error("header `{0}` is not valid text")]
    NotText(&'static str),
}

/// Errors while reading payment requirements out of a `402` response.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The `PAYMENT-REQUIRED` header is present but unreadable.
    #[error("malformed PAYMENT-REQUIRED header: {0}")]
    Header(#[source] HttpError),

    /// Neither a header nor a body carried requirements.
    #[error("402 response carries no payment requirements")]
    Empty,

    /// The body is not JSON.
    #[error("402 body is not JSON: {0}")]
    Body(#[from] serde_json::Error),

    /// The requirements do not classify or normalize.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

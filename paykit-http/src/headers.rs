//! Encoding and decoding of x402 header values.
//!
//! Payment payloads, requirements and settlement confirmations travel as
//! base64 JSON. The sign-in-with-x bundle is base64 JSON under the current
//! protocol; [`AuthHeaderEncoding`] also offers the raw JSON form used by
//! legacy-speaking peers, so that writing and reading always agree.

use http::{HeaderMap, HeaderValue};
use paykit::WireVersion;
use paykit::encoding::{decode_json, encode_json};
use paykit::proto::SettleResponse;
use paykit_evm::SignedChallenge;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
};
use crate::error::HttpError;

/// Header carrying a payment payload of `version`.
#[must_use]
pub const fn payment_header_name(version: WireVersion) -> &'static str {
    match version {
        WireVersion::Legacy => X_PAYMENT_HEADER,
        WireVersion::Current => PAYMENT_SIGNATURE_HEADER,
    }
}

/// Decodes the `PAYMENT-REQUIRED` header, if present.
///
/// # Errors
///
/// Returns [`HttpError`] if the header is present but not base64 JSON.
pub fn decode_payment_required(headers: &HeaderMap) -> Result<Option<Value>, HttpError> {
    headers
        .get(PAYMENT_REQUIRED_HEADER)
        .map(|value| -> Result<Value, HttpError> {
            let text = value
                .to_str()
                .map_err(|_| HttpError::NotText(PAYMENT_REQUIRED_HEADER))?;
            Ok(decode_json(text)?)
        })
        .transpose()
}

/// Finds the settlement header, preferring `PAYMENT-RESPONSE` over the legacy
/// `X-PAYMENT-RESPONSE`.
#[must_use]
pub fn find_settlement(headers: &HeaderMap) -> Option<(&'static str, &HeaderValue)> {
    [PAYMENT_RESPONSE_HEADER, X_PAYMENT_RESPONSE_HEADER]
        .into_iter()
        .find_map(|name| headers.get(name).map(|value| (name, value)))
}

/// Decodes a settlement header value.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON failure.
pub fn decode_settlement(name: &'static str, value: &HeaderValue) -> Result<SettleResponse, HttpError> {
    let text = value.to_str().map_err(|_| HttpError::NotText(name))?;
    Ok(decode_json(text)?)
}

/// Wire representation of the `SIGN-IN-WITH-X` header.
///
/// Challenges only arrive through the extension map of a current-format
/// `402`, so the authentication engine always writes [`Base64Json`]. The
/// [`RawJson`] form is for direct codec callers, such as servers decoding a
/// header sent by a legacy client.
///
/// [`Base64Json`]: Self::Base64Json
/// [`RawJson`]: Self::RawJson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthHeaderEncoding {
    /// Base64 of the JSON bundle.
    Base64Json,
    /// The JSON bundle as-is. Never produced by the authentication engine.
    RawJson,
}

impl AuthHeaderEncoding {
    /// Representation expected by servers speaking `version`.
    #[must_use]
    pub const fn for_version(version: WireVersion) -> Self {
        match version {
            WireVersion::Current => Self::Base64Json,
            WireVersion::Legacy => Self::RawJson,
        }
    }

    /// Encodes a signed bundle into a header value.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if serialization fails or the result is not a
    /// legal header value.
    pub fn encode(self, signed: &SignedChallenge) -> Result<HeaderValue, HttpError> {
        let text = match self {
            Self::Base64Json => encode_json(signed)?,
            Self::RawJson => serde_json::to_string(signed)?,
        };
        Ok(HeaderValue::from_str(&text)?)
    }

    /// Decodes a header value produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if the value is not a bundle in this encoding.
    pub fn decode(self, value: &str) -> Result<SignedChallenge, HttpError> {
        match self {
            Self::Base64Json => Ok(decode_json(value)?),
            Self::RawJson => Ok(serde_json::from_str(value)?),
        }
    }
}

/// Flattens headers into a sorted name to value map for diagnostics.
///
/// Repeated headers are joined with `", "`; non-text values are skipped.
#[must_use]
pub fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        snapshot
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};
    use paykit::extensions::ExtensionChallenge;
    use serde_json::json;

    fn signed() -> SignedChallenge {
        SignedChallenge {
            challenge: ExtensionChallenge {
                domain: "api.example.com".into(),
                uri: "https://api.example.com/me".into(),
                version: "1".into(),
                chain_id: "eip155:8453".into(),
                nonce: "n0nce".into(),
                issued_at: "2026-01-01T00:00:00Z".into(),
                expiration_time: None,
                statement: None,
                not_before: None,
                request_id: None,
                resources: None,
            },
            address: Address::repeat_byte(0x42),
            signature: Bytes::from_static(&[0xde, 0xad]),
        }
    }

    #[test]
    fn test_auth_encoding_follows_version() {
        assert_eq!(
            AuthHeaderEncoding::for_version(WireVersion::Current),
            AuthHeaderEncoding::Base64Json
        );
        assert_eq!(
            AuthHeaderEncoding::for_version(WireVersion::Legacy),
            AuthHeaderEncoding::RawJson
        );
        for encoding in [AuthHeaderEncoding::Base64Json, AuthHeaderEncoding::RawJson] {
            let value = encoding.encode(&signed()).unwrap();
            assert_eq!(encoding.decode(value.to_str().unwrap()).unwrap(), signed());
        }
        let raw = AuthHeaderEncoding::RawJson.encode(&signed()).unwrap();
        assert!(raw.to_str().unwrap().starts_with('{'));
        assert!(
            AuthHeaderEncoding::Base64Json
                .decode(raw.to_str().unwrap())
                .is_err()
        );
    }

    #[test]
    fn test_settlement_header_precedence() {
        let current = encode_json(&json!({"success": true, "transaction": "0x1", "network": "base"}))
            .unwrap();
        let legacy = encode_json(&json!({"success": true, "transaction": "0x2", "network": "base"}))
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_PAYMENT_RESPONSE_HEADER, legacy.parse().unwrap());
        let (name, value) = find_settlement(&headers).unwrap();
        assert_eq!(name, X_PAYMENT_RESPONSE_HEADER);
        assert_eq!(decode_settlement(name, value).unwrap().transaction, "0x2");

        headers.insert(PAYMENT_RESPONSE_HEADER, current.parse().unwrap());
        let (name, value) = find_settlement(&headers).unwrap();
        assert_eq!(decode_settlement(name, value).unwrap().transaction, "0x1");
    }

    #[test]
    fn test_malformed_payment_required_header() {
        let mut headers = HeaderMap::new();
        assert!(decode_payment_required(&headers).unwrap().is_none());
        headers.insert(PAYMENT_REQUIRED_HEADER, "%%%".parse().unwrap());
        assert!(decode_payment_required(&headers).is_err());
    }

    #[test]
    fn test_header_snapshot_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-a", "1".parse().unwrap());
        headers.append("x-a", "2".parse().unwrap());
        headers.insert("x-b", "3".parse().unwrap());
        let snapshot = header_snapshot(&headers);
        assert_eq!(snapshot["x-a"], "1, 2");
        assert_eq!(snapshot["x-b"], "3");
    }
}

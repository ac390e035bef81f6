//! Wire formats of the `402 Payment Required` exchange.
//!
//! Two generations of servers are in the wild:
//!
//! - **Legacy** ([`v1`]): `x402Version: 1` (or no version at all), network names,
//!   `maxAmountRequired`, per-requirement resource metadata.
//! - **Current** ([`v2`]): `x402Version: 2`, CAIP-2 networks, `amount`, a
//!   top-level resource descriptor and an extension map.
//!
//! [`classify`] decides which one a body is, and [`RawPaymentRequired`] holds
//! the typed, not yet normalized result.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::fmt;

use crate::normalize::NormalizeError;

pub mod v1;
pub mod v2;

/// Top-level field carrying the protocol version.
pub const VERSION_FIELD: &str = "x402Version";

/// Amount field name used by legacy requirements.
pub const LEGACY_AMOUNT_FIELD: &str = "maxAmountRequired";

/// Amount field name used by current requirements.
pub const AMOUNT_FIELD: &str = "amount";

/// Protocol generation of a wire message.
///
/// Serializes as the bare version number (`1` or `2`) and rejects any other
/// number on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireVersion {
    /// `x402Version: 1`.
    Legacy,
    /// `x402Version: 2`.
    Current,
}

impl WireVersion {
    /// The numeric protocol version.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Legacy => 1,
            Self::Current => 2,
        }
    }

    /// Maps a numeric protocol version, if known.
    #[must_use]
    pub const fn from_number(number: u64) -> Option<Self> {
        match number {
            1 => Some(Self::Legacy),
            2 => Some(Self::Current),
            _ => None,
        }
    }
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl Serialize for WireVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for WireVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = u64::deserialize(deserializer)?;
        Self::from_number(number).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported x402Version {number}"))
        })
    }
}

/// Decides whether a `402` body is in the legacy or the current format.
///
/// An explicit `x402Version` always wins. Without one, the body is legacy when
/// its first requirement carries `maxAmountRequired` instead of `amount`, and
/// current otherwise.
///
/// # Errors
///
/// - [`NormalizeError::NotAnObject`] if `body` is not a JSON object.
/// - [`NormalizeError::UnsupportedVersion`] for an explicit version other than 1 or 2.
/// - [`NormalizeError::Unclassifiable`] if the first requirement carries neither
///   amount field, whatever version is declared.
pub fn classify(body: &Value) -> Result<WireVersion, NormalizeError> {
    let object = body.as_object().ok_or(NormalizeError::NotAnObject)?;

    let declared = match object.get(VERSION_FIELD) {
        None | Some(Value::Null) => None,
        Some(version) => Some(
            version
                .as_u64()
                .and_then(WireVersion::from_number)
                .ok_or_else(|| NormalizeError::UnsupportedVersion(version.to_string()))?,
        ),
    };

    let first = object
        .get("accepts")
        .and_then(Value::as_array)
        .and_then(|accepts| accepts.first());
    let has_legacy_amount = first.is_some_and(|entry| entry.get(LEGACY_AMOUNT_FIELD).is_some());
    let has_amount = first.is_some_and(|entry| entry.get(AMOUNT_FIELD).is_some());
    if first.is_some() && !has_legacy_amount && !has_amount {
        return Err(NormalizeError::Unclassifiable);
    }

    Ok(declared.unwrap_or(if has_legacy_amount && !has_amount {
        WireVersion::Legacy
    } else {
        WireVersion::Current
    }))
}

/// A classified `402` body, typed but not yet normalized.
///
/// Payment instruments are built from this shape so the signed payload echoes
/// exactly what the server sent.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPaymentRequired {
    /// Legacy body.
    Legacy(Box<v1::PaymentRequired>),
    /// Current body.
    Current(Box<v2::PaymentRequired>),
}

impl RawPaymentRequired {
    /// Classifies and deserializes a `402` body.
    ///
    /// # Errors
    ///
    /// Returns the [`classify`] errors, or [`NormalizeError::Malformed`] if the
    /// body does not match the classified format.
    pub fn from_value(body: &Value) -> Result<Self, NormalizeError> {
        let version = classify(body)?;
        let malformed = |source| NormalizeError::Malformed { version, source };
        Ok(match version {
            WireVersion::Legacy => {
                Self::Legacy(Box::new(v1::PaymentRequired::deserialize(body).map_err(malformed)?))
            }
            WireVersion::Current => {
                Self::Current(Box::new(v2::PaymentRequired::deserialize(body).map_err(malformed)?))
            }
        })
    }

    /// The protocol generation of this body.
    #[must_use]
    pub const fn version(&self) -> WireVersion {
        match self {
            Self::Legacy(_) => WireVersion::Legacy,
            Self::Current(_) => WireVersion::Current,
        }
    }

    /// Number of requirements offered.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Legacy(body) => body.accepts.len(),
            Self::Current(body) => body.accepts.len(),
        }
    }

    /// Whether the server offered no requirement at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Settlement confirmation returned in `PAYMENT-RESPONSE` / `X-PAYMENT-RESPONSE`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether the server reports the payment as settled.
    pub success: bool,
    /// Transaction hash or signature, empty when settlement failed.
    #[serde(default)]
    pub transaction: String,
    /// Network the transaction landed on.
    #[serde(default)]
    pub network: String,
    /// Paying address as reported by the server.
    pub payer: Option<String>,
    /// Machine-readable failure reason.
    pub error_reason: Option<String>,
}

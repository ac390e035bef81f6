//! Legacy (`x402Version: 1`) wire types.
//!
//! Legacy servers identify networks by name (`"base-sepolia"`), price
//! requirements with `maxAmountRequired` and describe the resource on every
//! requirement rather than once per response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::WireVersion;

/// One acceptable way to pay, as a legacy server declares it.
///
/// `maxAmountRequired` is optional at the serde level so that its absence is
/// reported by the normalizer with the entry index instead of a bare serde error.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme (e.g. `"exact"`).
    pub scheme: String,
    /// Network name (e.g. `"base-sepolia"`).
    pub network: String,
    /// Price in the asset's smallest unit.
    pub max_amount_required: Option<String>,
    /// URL of the resource being paid for.
    pub resource: Option<String>,
    /// Human-readable description of the resource.
    pub description: Option<String>,
    /// MIME type of the resource.
    pub mime_type: Option<String>,
    /// Embedded calling convention, see [`crate::discovery`].
    pub output_schema: Option<Value>,
    /// Recipient address.
    pub pay_to: String,
    /// Validity window of a payment authorization, in seconds.
    pub max_timeout_seconds: u64,
    /// Token contract address.
    pub asset: String,
    /// Scheme-specific data (EIP-712 domain name/version for `exact`).
    pub extra: Option<Value>,
}

/// Legacy `402` response body.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Always [`WireVersion::Legacy`]; legacy servers may omit the field.
    #[serde(default = "legacy")]
    pub x402_version: WireVersion,
    /// Optional error explaining why the request was refused.
    pub error: Option<String>,
    /// Acceptable requirements in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
}

/// Signed payment sent back in the `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = Value> {
    /// Always [`WireVersion::Legacy`].
    pub x402_version: WireVersion,
    /// Payment scheme of the requirement being fulfilled.
    pub scheme: String,
    /// Network name of the requirement being fulfilled.
    pub network: String,
    /// Scheme-specific signed payload.
    pub payload: TPayload,
}

const fn legacy() -> WireVersion {
    WireVersion::Legacy
}

//! Current (`x402Version: 2`) wire types.
//!
//! Current servers identify networks by CAIP-2 id, price requirements with
//! `amount`, describe the resource once at the top level and may attach
//! protocol extensions.
//!
//! ```json
//! {
//!   "x402Version": 2,
//!   "resource": { "url": "https://api.example.com/data", "description": "Market data" },
//!   "accepts": [{
//!     "scheme": "exact",
//!     "network": "eip155:8453",
//!     "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
//!     "amount": "1000000",
//!     "payTo": "0x...",
//!     "maxTimeoutSeconds": 300,
//!     "extra": { "name": "USD Coin", "version": "2" }
//!   }],
//!   "extensions": { "sign-in-with-x": { "info": { ... } } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::WireVersion;
use crate::extensions::Extensions;

/// Describes the resource a `402` guards.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Resource URL.
    pub url: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// MIME type of the resource.
    pub mime_type: Option<String>,
}

/// One acceptable way to pay, as a current server declares it.
///
/// `amount` is optional at the serde level so that its absence is reported by
/// the normalizer with the entry index instead of a bare serde error.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme (e.g. `"exact"`).
    pub scheme: String,
    /// CAIP-2 network id (e.g. `"eip155:8453"`).
    pub network: String,
    /// Token contract address.
    pub asset: String,
    /// Price in the asset's smallest unit.
    pub amount: Option<String>,
    /// Recipient address.
    pub pay_to: String,
    /// Validity window of a payment authorization, in seconds.
    pub max_timeout_seconds: u64,
    /// Scheme-specific data (EIP-712 domain name/version for `exact`).
    #[serde(default = "empty_object")]
    pub extra: Value,
}

/// Current `402` response body, also carried base64-encoded in `PAYMENT-REQUIRED`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Always [`WireVersion::Current`].
    #[serde(default = "current")]
    pub x402_version: WireVersion,
    /// Optional error explaining why the request was refused.
    pub error: Option<String>,
    /// Resource descriptor.
    pub resource: Option<ResourceInfo>,
    /// Acceptable requirements in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Protocol extensions keyed by name.
    pub extensions: Option<Extensions>,
}

/// Signed payment sent back in the `PAYMENT-SIGNATURE` header.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = Value> {
    /// Always [`WireVersion::Current`].
    pub x402_version: WireVersion,
    /// Scheme-specific signed payload.
    pub payload: TPayload,
    /// The requirement being fulfilled, echoed verbatim.
    pub accepted: PaymentRequirements,
    /// The resource descriptor from the `402`, if any.
    pub resource: Option<ResourceInfo>,
}

const fn current() -> WireVersion {
    WireVersion::Current
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

//! Version normalization.
//!
//! Legacy and current `402` bodies are classified ([`crate::proto::classify`])
//! and then mapped by two independent, total functions into one shape,
//! [`NormalizedPaymentRequired`]. Normalization is all-or-nothing: a single bad
//! requirement fails the whole body.

use alloy_primitives::U256;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::chain::ChainId;
use crate::discovery::DiscoveryInfo;
use crate::extensions::Extensions;
use crate::networks::NetworkLookup;
use crate::proto::v2::ResourceInfo;
use crate::proto::{AMOUNT_FIELD, LEGACY_AMOUNT_FIELD, RawPaymentRequired, WireVersion, v1, v2};

/// Why a `402` body could not be normalized.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The body is not a JSON object.
    #[error("payment required body is not a JSON object")]
    NotAnObject,
    /// `x402Version` is neither 1 nor 2.
    #[error("unsupported x402Version {0}")]
    UnsupportedVersion(String),
    /// The first requirement carries neither amount field.
    #[error("requirement 0 carries neither `maxAmountRequired` nor `amount`")]
    Unclassifiable,
    /// A requirement lacks the amount field of its format.
    #[error("requirement {index} is missing `{field}`")]
    MissingAmount {
        /// Position in `accepts`.
        index: usize,
        /// The expected field name.
        field: &'static str,
    },
    /// A requirement's amount is not a decimal integer.
    #[error("requirement {index} amount `{value}` is not a decimal integer")]
    InvalidAmount {
        /// Position in `accepts`.
        index: usize,
        /// The offending value.
        value: String,
    },
    /// The body does not deserialize as the classified format.
    #[error("malformed v{version} payment required body: {source}")]
    Malformed {
        /// The classified format.
        version: WireVersion,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// One acceptable way to pay, independent of wire format.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRequirement {
    /// Payment scheme (`"exact"`).
    pub scheme: String,
    /// Network identifier as the server wrote it.
    pub network: String,
    /// Price in the asset's smallest unit, always a decimal integer.
    pub amount: String,
    /// Token contract address.
    pub asset: String,
    /// Recipient address.
    pub pay_to: String,
    /// Validity window of a payment authorization, in seconds.
    pub max_timeout_seconds: u64,
    /// Scheme-specific data, an empty object when absent.
    pub extra: Value,
    /// Legacy per-requirement resource URL.
    pub resource: Option<String>,
    /// Legacy per-requirement description.
    pub description: Option<String>,
    /// Legacy per-requirement MIME type.
    pub mime_type: Option<String>,
    /// Calling convention recovered from a legacy `outputSchema`.
    pub discovery: Option<DiscoveryInfo>,
}

impl NormalizedRequirement {
    /// The amount as an integer.
    ///
    /// Normalization guarantees the amount parses, so this never fails for
    /// values produced by [`normalize`].
    #[must_use]
    pub fn amount_value(&self) -> Option<U256> {
        parse_amount(&self.amount)
    }

    /// Resolves [`network`](Self::network) to a canonical chain id.
    #[must_use]
    pub fn chain_id(&self, networks: &dyn NetworkLookup) -> Option<ChainId> {
        networks.resolve(&self.network)
    }
}

/// A `402` body in the single internal shape.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPaymentRequired {
    /// Wire format the body arrived in.
    pub x402_version: WireVersion,
    /// Optional server error string.
    pub error: Option<String>,
    /// Requirements in server preference order.
    pub accepts: Vec<NormalizedRequirement>,
    /// Top-level resource descriptor (current format only).
    pub resource: Option<ResourceInfo>,
    /// Extension map (current format only).
    pub extensions: Option<Extensions>,
}

impl NormalizedPaymentRequired {
    /// Names of the extensions present, empty when there are none.
    #[must_use]
    pub fn extension_names(&self) -> Vec<String> {
        self.extensions
            .as_ref()
            .map(Extensions::names)
            .unwrap_or_default()
    }
}

/// Classifies and normalizes a `402` body.
///
/// # Errors
///
/// Returns [`NormalizeError`] if the body cannot be classified, does not match
/// its format, or any requirement lacks a valid amount.
pub fn normalize(body: &Value) -> Result<NormalizedPaymentRequired, NormalizeError> {
    RawPaymentRequired::from_value(body)?.normalize()
}

impl RawPaymentRequired {
    /// Maps this body into the internal shape.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MissingAmount`] or
    /// [`NormalizeError::InvalidAmount`] for the first bad requirement.
    pub fn normalize(&self) -> Result<NormalizedPaymentRequired, NormalizeError> {
        let normalized = match self {
            Self::Legacy(body) => from_legacy(body),
            Self::Current(body) => from_current(body),
        }?;
        #[cfg(feature = "telemetry")]
        debug!(
            version = %normalized.x402_version,
            requirements = normalized.accepts.len(),
            extensions = ?normalized.extension_names(),
            "Normalized payment requirements"
        );
        Ok(normalized)
    }
}

fn from_legacy(body: &v1::PaymentRequired) -> Result<NormalizedPaymentRequired, NormalizeError> {
    let accepts = body
        .accepts
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let amount = checked_amount(
                index,
                LEGACY_AMOUNT_FIELD,
                entry.max_amount_required.as_deref(),
            )?;
            Ok(NormalizedRequirement {
                scheme: entry.scheme.clone(),
                network: entry.network.clone(),
                amount,
                asset: entry.asset.clone(),
                pay_to: entry.pay_to.clone(),
                max_timeout_seconds: entry.max_timeout_seconds,
                extra: entry.extra.clone().unwrap_or_else(empty_object),
                resource: entry.resource.clone(),
                description: entry.description.clone(),
                mime_type: entry.mime_type.clone(),
                discovery: DiscoveryInfo::from_legacy(entry),
            })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    Ok(NormalizedPaymentRequired {
        x402_version: WireVersion::Legacy,
        error: body.error.clone(),
        accepts,
        resource: None,
        extensions: None,
    })
}

fn from_current(body: &v2::PaymentRequired) -> Result<NormalizedPaymentRequired, NormalizeError> {
    let accepts = body
        .accepts
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let amount = checked_amount(index, AMOUNT_FIELD, entry.amount.as_deref())?;
            Ok(NormalizedRequirement {
                scheme: entry.scheme.clone(),
                network: entry.network.clone(),
                amount,
                asset: entry.asset.clone(),
                pay_to: entry.pay_to.clone(),
                max_timeout_seconds: entry.max_timeout_seconds,
                extra: if entry.extra.is_null() {
                    empty_object()
                } else {
                    entry.extra.clone()
                },
                resource: None,
                description: None,
                mime_type: None,
                discovery: None,
            })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    Ok(NormalizedPaymentRequired {
        x402_version: WireVersion::Current,
        error: body.error.clone(),
        accepts,
        resource: body.resource.clone(),
        extensions: body.extensions.clone(),
    })
}

fn checked_amount(
    index: usize,
    field: &'static str,
    amount: Option<&str>,
) -> Result<String, NormalizeError> {
    let amount = amount.ok_or(NormalizeError::MissingAmount { index, field })?;
    parse_amount(amount).ok_or_else(|| NormalizeError::InvalidAmount {
        index,
        value: amount.to_owned(),
    })?;
    Ok(amount.to_owned())
}

fn parse_amount(amount: &str) -> Option<U256> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(amount, 10).ok()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

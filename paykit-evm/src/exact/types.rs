//! Wire types of the EIP-155 `exact` scheme (EIP-3009 `transferWithAuthorization`).

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::sol;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::SystemTime;

/// Scheme name handled by this module.
pub const EXACT_SCHEME: &str = "exact";

/// Seconds since the Unix epoch, serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Wraps a raw seconds value.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// The current system time; a clock before the epoch reads as zero.
    #[must_use]
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs()),
        )
    }

    /// Raw seconds value.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map(Self)
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))
    }
}

/// The authorization a payer signs, as transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Token owner.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Amount in the token's smallest unit, decimal string.
    pub value: String,
    /// Not valid before this time.
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// Random replay-protection nonce.
    pub nonce: B256,
}

/// Signed `exact` payload carried inside a payment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Payload {
    /// 65-byte EIP-712 signature over the authorization.
    pub signature: Bytes,
    /// The signed authorization.
    pub authorization: Eip3009Authorization,
}

/// EIP-712 domain hints a server puts in a requirement's `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirementsExtra {
    /// Token name in the EIP-712 domain.
    pub name: String,
    /// Token version in the EIP-712 domain.
    pub version: String,
}

sol!(
    /// EIP-712 typed data of ERC-3009 `transferWithAuthorization`.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_is_a_string_on_the_wire() {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_value(ts).unwrap(), json!("1700000000"));
        let back: UnixTimestamp = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(back.as_secs(), 42);
        assert!(serde_json::from_value::<UnixTimestamp>(json!("-1")).is_err());
    }

    #[test]
    fn test_extra_ignores_unknown_keys() {
        let extra: PaymentRequirementsExtra = serde_json::from_value(json!({
            "name": "USD Coin",
            "version": "2",
            "assetTransferMethod": "eip3009"
        }))
        .unwrap();
        assert_eq!(extra.name, "USD Coin");
    }
}

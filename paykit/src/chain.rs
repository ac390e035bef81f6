//! CAIP-2 chain identifiers.
//!
//! Current-format requirements name their network as `namespace:reference`
//! (`eip155:8453`, `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`). Legacy
//! requirements use bare names and are mapped onto [`ChainId`] through
//! [`crate::networks::NetworkLookup`].

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// Namespace of EVM chains identified by their EIP-155 chain id.
pub const EIP155_NAMESPACE: &str = "eip155";

/// Namespace of Solana clusters.
pub const SOLANA_NAMESPACE: &str = "solana";

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to and from the colon-separated string form: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Creates a chain id from its namespace and reference.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Creates an `eip155` chain id from a numeric EVM chain id.
    #[must_use]
    pub fn eip155(chain_id: u64) -> Self {
        Self::new(EIP155_NAMESPACE, chain_id.to_string())
    }

    /// Returns the namespace component (`eip155`, `solana`, ...).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Whether this chain belongs to the EVM (`eip155`) namespace.
    #[must_use]
    pub fn is_eip155(&self) -> bool {
        self.namespace == EIP155_NAMESPACE
    }

    /// Returns the numeric EVM chain id, if this is an `eip155` chain with a
    /// decimal reference.
    #[must_use]
    pub fn eip155_reference(&self) -> Option<u64> {
        if self.is_eip155() {
            self.reference.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when a string is not of the form `namespace:reference`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chain id format `{0}`")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(Self::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.to_owned())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

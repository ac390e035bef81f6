//! Network metadata lookup.
//!
//! Legacy requirements name networks by human-readable names (`"base"`), while
//! current ones use CAIP-2 ids (`"eip155:8453"`). [`NetworkLookup`] is the seam
//! through which the engines turn either form into a canonical [`ChainId`].
//!
//! Concrete network data lives in chain-specific crates; `paykit-evm` exports
//! `EVM_NETWORKS`. Applications assemble a [`NetworkRegistry`] from such slices.

use std::collections::HashMap;

use crate::chain::ChainId;

/// Resolves a network identifier to its canonical chain id.
pub trait NetworkLookup: Send + Sync {
    /// Resolves a legacy network name or a CAIP-2 string.
    ///
    /// Returns `None` when the identifier is neither a CAIP-2 id nor a known name.
    fn resolve(&self, network: &str) -> Option<ChainId>;
}

/// A known network: its legacy name and its CAIP-2 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Legacy network name (e.g. `"base-sepolia"`).
    pub name: &'static str,
    /// CAIP-2 namespace (e.g. `"eip155"`).
    pub namespace: &'static str,
    /// CAIP-2 reference (e.g. `"84532"`).
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Returns the CAIP-2 chain id of this network.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Bidirectional map between legacy network names and [`ChainId`]s.
///
/// ```
/// use paykit::networks::{NetworkInfo, NetworkLookup, NetworkRegistry};
///
/// const NETWORKS: &[NetworkInfo] = &[NetworkInfo {
///     name: "base",
///     namespace: "eip155",
///     reference: "8453",
/// }];
///
/// let registry = NetworkRegistry::from_networks(NETWORKS);
/// assert_eq!(registry.resolve("base").unwrap().to_string(), "eip155:8453");
/// assert_eq!(registry.resolve("eip155:1").unwrap().to_string(), "eip155:1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    name_to_chain_id: HashMap<&'static str, ChainId>,
    chain_id_to_name: HashMap<ChainId, &'static str>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated from a network slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self {
            name_to_chain_id: HashMap::with_capacity(networks.len()),
            chain_id_to_name: HashMap::with_capacity(networks.len()),
        };
        registry.register(networks);
        registry
    }

    /// Registers additional networks.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            self.name_to_chain_id.insert(info.name, info.chain_id());
            self.chain_id_to_name.insert(info.chain_id(), info.name);
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_networks(mut self, networks: &[NetworkInfo]) -> Self {
        self.register(networks);
        self
    }

    /// Looks up a chain id by legacy network name.
    #[must_use]
    pub fn chain_id_by_name(&self, name: &str) -> Option<&ChainId> {
        self.name_to_chain_id.get(name)
    }

    /// Looks up the legacy network name of a chain id.
    #[must_use]
    pub fn name_by_chain_id(&self, chain_id: &ChainId) -> Option<&'static str> {
        self.chain_id_to_name.get(chain_id).copied()
    }

    /// Number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_to_chain_id.len()
    }

    /// Whether no network is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_to_chain_id.is_empty()
    }
}

impl NetworkLookup for NetworkRegistry {
    fn resolve(&self, network: &str) -> Option<ChainId> {
        if let Some(chain_id) = self.chain_id_by_name(network) {
            return Some(chain_id.clone());
        }
        network.parse().ok()
    }
}

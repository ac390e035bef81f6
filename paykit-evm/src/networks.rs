//! Known EVM networks and USDC deployments.

use alloy_primitives::{Address, address};
use paykit::networks::{NetworkInfo, NetworkRegistry};

/// Ethereum mainnet chain id.
pub const ETHEREUM_MAINNET: u64 = 1;
/// Base mainnet chain id.
pub const BASE_MAINNET: u64 = 8453;
/// Base Sepolia chain id.
pub const BASE_SEPOLIA: u64 = 84532;
/// Polygon mainnet chain id.
pub const POLYGON_MAINNET: u64 = 137;
/// Polygon Amoy chain id.
pub const POLYGON_AMOY: u64 = 80002;
/// Avalanche C-Chain chain id.
pub const AVALANCHE_MAINNET: u64 = 43114;
/// Avalanche Fuji chain id.
pub const AVALANCHE_FUJI: u64 = 43113;

/// Legacy network names of the supported EVM chains.
pub const EVM_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "ethereum",
        namespace: "eip155",
        reference: "1",
    },
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
    },
    NetworkInfo {
        name: "polygon-amoy",
        namespace: "eip155",
        reference: "80002",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
    },
    NetworkInfo {
        name: "avalanche-fuji",
        namespace: "eip155",
        reference: "43113",
    },
];

/// A token deployment together with its EIP-712 domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeployment {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract address.
    pub address: Address,
    /// EIP-712 domain name.
    pub name: &'static str,
    /// EIP-712 domain version.
    pub version: &'static str,
    /// Token decimals.
    pub decimals: u8,
}

/// USDC deployments whose EIP-712 domain is known.
pub const USDC_DEPLOYMENTS: &[TokenDeployment] = &[
    usdc(
        ETHEREUM_MAINNET,
        address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        "USD Coin",
    ),
    usdc(
        BASE_MAINNET,
        address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        "USD Coin",
    ),
    usdc(
        BASE_SEPOLIA,
        address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
        "USDC",
    ),
    usdc(
        POLYGON_MAINNET,
        address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
        "USD Coin",
    ),
    usdc(
        POLYGON_AMOY,
        address!("41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF"),
        "USDC",
    ),
    usdc(
        AVALANCHE_MAINNET,
        address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
        "USD Coin",
    ),
    usdc(
        AVALANCHE_FUJI,
        address!("5425890298aed601595a70AB815c96711a31Bc65"),
        "USD Coin",
    ),
];

const fn usdc(chain_id: u64, address: Address, name: &'static str) -> TokenDeployment {
    TokenDeployment {
        chain_id,
        address,
        name,
        version: "2",
        decimals: 6,
    }
}

/// Finds a known deployment of `asset` on `chain_id`.
#[must_use]
pub fn known_deployment(chain_id: u64, asset: Address) -> Option<&'static TokenDeployment> {
    USDC_DEPLOYMENTS
        .iter()
        .find(|deployment| deployment.chain_id == chain_id && deployment.address == asset)
}

/// A registry resolving the legacy names in [`EVM_NETWORKS`].
#[must_use]
pub fn evm_networks() -> NetworkRegistry {
    NetworkRegistry::from_networks(EVM_NETWORKS)
}

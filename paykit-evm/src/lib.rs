#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) signing for paykit.
//!
//! Everything that needs a key lives here: the [`SignerLike`] capability the
//! HTTP engines are handed, `exact` payment instruments and sign-in-with-x
//! proofs.
//!
//! # Modules
//!
//! - [`exact`] - ERC-3009 payment instruments for the `exact` scheme
//! - [`networks`] - Known EVM networks and USDC deployments
//! - [`signer`] - The signing capability
//! - [`siwx`] - EIP-4361 challenge messages, signing and verification
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits `tracing` events when signing

pub mod exact;
pub mod networks;
pub mod signer;
pub mod siwx;

pub use exact::{ExactEvmClient, PaymentError, PaymentInstrument};
pub use networks::evm_networks;
pub use signer::SignerLike;
pub use siwx::{SignedChallenge, SiwxError, Verification, sign_challenge, verify_signed_challenge};

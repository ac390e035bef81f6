//! The `exact` payment scheme on EIP-155 chains.
//!
//! Payments are ERC-3009 `transferWithAuthorization` messages signed with
//! EIP-712. The payer never broadcasts anything; the server (or its
//! facilitator) submits the authorization on chain.

pub mod client;
pub mod types;

pub use client::{
    Eip3009SigningParams, ExactEvmClient, PaymentError, PaymentInstrument,
    sign_erc3009_authorization,
};
pub use types::EXACT_SCHEME;

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP engines for x402 clients.
//!
//! [`FullClient::negotiate`] turns an ordinary request into a paid one when
//! the server answers `402 Payment Required`; [`FullClient::authenticate`]
//! answers a sign-in-with-x challenge instead. Both send at most two requests
//! and report every outcome as a value, never as an error.
//!
//! ```no_run
//! use alloy_signer_local::PrivateKeySigner;
//! use paykit_http::FullClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FullClient::builder(PrivateKeySigner::random())
//!     .preferred_network("base-sepolia")
//!     .build();
//! let request = reqwest::Client::new()
//!     .get("https://api.example.com/weather")
//!     .build()?;
//! let result = client.negotiate(request).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`auth`] - Sign-in-with-x authentication engine
//! - [`constants`] - Header names and status codes
//! - [`error`] - Header and parsing errors
//! - [`factory`] - The cached read-only client and the signing client
//! - [`headers`] - Header value codecs
//! - [`negotiation`] - Payment negotiation engine
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits `tracing` spans and events for each phase

pub mod auth;
pub mod constants;
pub mod error;
pub mod factory;
pub mod headers;
pub mod negotiation;

pub use auth::{AuthResult, AuthStage};
pub use factory::{FullClient, FullClientBuilder, ReadOnlyClient, read_only_client};
pub use negotiation::{NegotiationResult, Phase, SettlementStatus};

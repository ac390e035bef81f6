#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for x402 clients.
//!
//! A server that wants to be paid, or wants the caller to prove ownership of
//! an address, answers `402 Payment Required` with a body describing what it
//! accepts. Two wire generations exist; this crate classifies a body, maps it
//! into one internal shape and exposes the pieces the client engines need.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain identifiers
//! - [`discovery`] - Calling conventions recovered from legacy output schemas
//! - [`encoding`] - Base64-wrapped JSON used by every x402 header
//! - [`extensions`] - The extension map and the `sign-in-with-x` challenge
//! - [`networks`] - Network name lookup
//! - [`normalize`] - The version normalizer
//! - [`proto`] - Legacy and current wire types
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits `tracing` events during normalization

pub mod chain;
pub mod discovery;
pub mod encoding;
pub mod extensions;
pub mod networks;
pub mod normalize;
pub mod proto;

pub use normalize::{NormalizeError, NormalizedPaymentRequired, NormalizedRequirement, normalize};
pub use proto::{RawPaymentRequired, WireVersion};

//! Client construction.
//!
//! Two capabilities exist. The [`ReadOnlyClient`] only parses: it is built
//! once per process around a fixed, publicly known key and is shared by every
//! probe and every authentication flow. A [`FullClient`] wraps a caller's
//! signer and is the only thing that ever produces a payment or a proof.

use alloy_primitives::{Address, B256, b256};
use alloy_signer_local::PrivateKeySigner;
use http::HeaderMap;
use paykit::chain::ChainId;
use paykit::networks::{NetworkLookup, NetworkRegistry};
use paykit::{NormalizedPaymentRequired, RawPaymentRequired};
use paykit_evm::exact::ExactEvmClient;
use paykit_evm::{PaymentError, SignerLike};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::Value;
use std::sync::LazyLock;
#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::error::ParseError;
use crate::headers::decode_payment_required;

/// Well-known placeholder key of the read-only client. Not a secret.
pub const PLACEHOLDER_KEY: B256 =
    b256!("0000000000000000000000000000000000000000000000000000000000000001");

static READ_ONLY: LazyLock<ReadOnlyClient> = LazyLock::new(|| {
    let signer = PrivateKeySigner::from_bytes(&PLACEHOLDER_KEY)
        .expect("placeholder key is a valid secp256k1 scalar");
    ReadOnlyClient {
        exact: ExactEvmClient::new(signer),
    }
});

/// Returns the process-wide read-only client.
#[must_use]
pub fn read_only_client() -> &'static ReadOnlyClient {
    &READ_ONLY
}

/// Payment requirements in both raw and normalized form.
#[derive(Debug, Clone)]
pub struct ParsedPaymentRequired {
    /// As received, used for signing.
    pub raw: RawPaymentRequired,
    /// The single internal shape, used for selection and display.
    pub normalized: NormalizedPaymentRequired,
}

/// A parse-only client bound to [`PLACEHOLDER_KEY`].
///
/// Holds no per-call state and is never mutated after construction.
#[derive(Debug)]
pub struct ReadOnlyClient {
    exact: ExactEvmClient<PrivateKeySigner>,
}

impl ReadOnlyClient {
    /// Address of the placeholder key.
    #[must_use]
    pub fn address(&self) -> Address {
        self.exact.address()
    }

    /// Reads the requirements of a `402` response.
    ///
    /// The `PAYMENT-REQUIRED` header wins over the body when present.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if neither source yields a body that normalizes.
    pub fn parse(&self, headers: &HeaderMap, body: &[u8]) -> Result<ParsedPaymentRequired, ParseError> {
        let value = match decode_payment_required(headers).map_err(ParseError::Header)? {
            Some(value) => value,
            None if body.iter().all(u8::is_ascii_whitespace) => return Err(ParseError::Empty),
            None => serde_json::from_slice::<Value>(body)?,
        };
        let raw = RawPaymentRequired::from_value(&value)?;
        let normalized = raw.normalize()?;

        #[cfg(feature = "telemetry")]
        debug!(
            version = %normalized.x402_version,
            requirements = normalized.accepts.len(),
            extensions = ?normalized.extension_names(),
            "Parsed payment requirements"
        );

        Ok(ParsedPaymentRequired { raw, normalized })
    }

    /// Requirements an EVM `exact` signer could pay, with their chains.
    #[must_use]
    pub fn payable(&self, normalized: &NormalizedPaymentRequired) -> Vec<(usize, ChainId)> {
        self.exact.candidates(normalized)
    }
}

/// A signing client bound to a caller's key.
#[derive(Debug)]
pub struct FullClient<S> {
    pub(crate) exact: ExactEvmClient<S>,
    pub(crate) preferred_network: Option<String>,
    pub(crate) http: ClientWithMiddleware,
}

impl<S: SignerLike> FullClient<S> {
    /// Starts building a client around `signer`.
    pub fn builder(signer: S) -> FullClientBuilder<S> {
        FullClientBuilder {
            signer,
            preferred_network: None,
            http: None,
            networks: None,
        }
    }

    /// A client with default settings.
    pub fn new(signer: S) -> Self {
        Self::builder(signer).build()
    }

    /// Address payments and proofs are signed for.
    pub fn address(&self) -> Address {
        self.exact.address()
    }

    /// The underlying signer.
    pub const fn signer(&self) -> &S {
        self.exact.signer()
    }

    /// The configured network preference, if any.
    pub fn preferred_network(&self) -> Option<&str> {
        self.preferred_network.as_deref()
    }

    /// The HTTP transport.
    pub const fn http(&self) -> &ClientWithMiddleware {
        &self.http
    }

    /// Picks the requirement to pay.
    ///
    /// Among requirements this client can pay, returns the first whose chain
    /// matches the preferred network, else the first one in server order.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NoAcceptableRequirement`] listing what was
    /// offered when nothing is payable.
    pub fn select(&self, normalized: &NormalizedPaymentRequired) -> Result<usize, PaymentError> {
        let candidates = self.exact.candidates(normalized);
        let preferred = self
            .preferred_network
            .as_deref()
            .and_then(|network| self.exact.networks().resolve(network));

        let chosen = preferred
            .and_then(|preferred| {
                candidates
                    .iter()
                    .find(|(_, chain_id)| *chain_id == preferred)
            })
            .or_else(|| candidates.first())
            .map(|(index, _)| *index);

        chosen.ok_or_else(|| PaymentError::NoAcceptableRequirement {
            offered: normalized
                .accepts
                .iter()
                .map(|requirement| format!("{}@{}", requirement.scheme, requirement.network))
                .collect(),
        })
    }
}

/// Builder for [`FullClient`].
#[derive(Debug)]
pub struct FullClientBuilder<S> {
    signer: S,
    preferred_network: Option<String>,
    http: Option<ClientWithMiddleware>,
    networks: Option<NetworkRegistry>,
}

impl<S: SignerLike> FullClientBuilder<S> {
    /// Network used as a tie-break when several requirements are payable.
    ///
    /// Accepts a legacy name (`base-sepolia`) or a CAIP-2 id (`eip155:84532`).
    #[must_use]
    pub fn preferred_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    /// HTTP transport, for callers stacking their own middleware.
    #[must_use]
    pub fn http_client(mut self, http: ClientWithMiddleware) -> Self {
        self.http = Some(http);
        self
    }

    /// Network registry replacing the built-in EVM networks.
    #[must_use]
    pub fn networks(mut self, networks: NetworkRegistry) -> Self {
        self.networks = Some(networks);
        self
    }

    /// Finishes the client.
    pub fn build(self) -> FullClient<S> {
        let exact = match self.networks {
            Some(networks) => ExactEvmClient::with_networks(self.signer, networks),
            None => ExactEvmClient::new(self.signer),
        };
        FullClient {
            exact,
            preferred_network: self.preferred_network,
            http: self
                .http
                .unwrap_or_else(|| ClientBuilder::new(reqwest::Client::new()).build()),
        }
    }
}

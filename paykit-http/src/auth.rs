//! The sign-in-with-x authentication engine.
//!
//! Some resources answer `402` not to be paid but to have the caller prove
//! they own an address. The proof request rides in the `sign-in-with-x`
//! extension of the requirements; the engine signs the server's challenge and
//! retries once with the `SIGN-IN-WITH-X` header.
//!
//! Like negotiation, every outcome is an [`AuthResult`]. A `402` without the
//! extension is reported as [`AuthStage::MissingExtension`] so callers can fall
//! back to paying.

use alloy_primitives::Address;
use http::StatusCode;
use paykit::NormalizedPaymentRequired;
use paykit::extensions::{ChallengeError, ExtensionChallenge};
use paykit_evm::SignerLike;
use paykit_evm::siwx::{SiwxError, check_challenge, sign_challenge};
use reqwest::Request;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument};

use crate::constants::SIGN_IN_WITH_X_HEADER;
use crate::factory::{FullClient, read_only_client};
use crate::headers::AuthHeaderEncoding;
use crate::negotiation::{CapturedResponse, ResponsePayload, execute};

/// Where an authentication attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStage {
    /// Sending the unmodified request.
    InitialRequest,
    /// Reading and normalizing the `402` requirements.
    ParseRequirements,
    /// The requirements carry no `sign-in-with-x` extension.
    MissingExtension,
    /// The challenge is incomplete or malformed.
    InvalidChallenge,
    /// The challenge targets a chain this client cannot sign for.
    UnsupportedChain,
    /// The signer failed.
    Signature,
    /// Resending the request with the signed challenge.
    AuthenticatedRequest,
}

/// Diagnostics attached to an authentication failure.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailureDetails {
    /// Response headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Response body as text.
    pub body: Option<String>,
    /// Extensions the server offered instead.
    pub extension_keys: Option<Vec<String>>,
    /// Required challenge fields that were absent or empty.
    pub missing_fields: Option<Vec<String>>,
}

/// Why and where an authentication attempt stopped.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    /// Stage in flight.
    pub stage: AuthStage,
    /// Human-readable reason.
    pub message: String,
    /// Diagnostics, when available.
    pub details: Option<AuthFailureDetails>,
}

/// Outcome of one authenticated call.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    /// Whether the caller got what they asked for.
    pub success: bool,
    /// Status of the last response, 0 if none was received.
    pub status: u16,
    /// Body of the last response.
    pub payload: Option<ResponsePayload>,
    /// Address that signed the challenge.
    pub address: Option<Address>,
    /// Domain of the signed challenge.
    pub domain: Option<String>,
    /// Chain of the signed challenge.
    pub chain_id: Option<String>,
    /// Normalized requirements of the `402`.
    pub payment_required: Option<NormalizedPaymentRequired>,
    /// Set when `success` is false.
    pub failure: Option<AuthFailure>,
}

impl AuthResult {
    fn failed(
        stage: AuthStage,
        status: u16,
        message: impl Into<String>,
        details: Option<AuthFailureDetails>,
        payment_required: Option<NormalizedPaymentRequired>,
    ) -> Self {
        let message = message.into();
        #[cfg(feature = "telemetry")]
        debug!(?stage, status, %message, "Authentication failed");
        Self {
            success: false,
            status,
            payload: None,
            address: None,
            domain: None,
            chain_id: None,
            payment_required,
            failure: Some(AuthFailure {
                stage,
                message,
                details,
            }),
        }
    }

    fn passthrough(response: &CapturedResponse) -> Self {
        if response.status.is_success() {
            Self {
                success: true,
                status: response.status.as_u16(),
                payload: response.payload(),
                address: None,
                domain: None,
                chain_id: None,
                payment_required: None,
                failure: None,
            }
        } else {
            Self::failed(
                AuthStage::InitialRequest,
                response.status.as_u16(),
                format!("request failed with status {}", response.status),
                Some(response_details(response)),
                None,
            )
        }
    }

    /// The stage the attempt failed in.
    #[must_use]
    pub fn stage(&self) -> Option<AuthStage> {
        self.failure.as_ref().map(|failure| failure.stage)
    }

    /// Whether the resource asked for payment rather than authentication.
    #[must_use]
    pub fn wants_payment(&self) -> bool {
        self.stage() == Some(AuthStage::MissingExtension)
    }
}

fn response_details(response: &CapturedResponse) -> AuthFailureDetails {
    let details = response.details();
    AuthFailureDetails {
        headers: Some(details.headers),
        body: details.body,
        ..AuthFailureDetails::default()
    }
}

impl<S: SignerLike> FullClient<S> {
    /// Performs `request`, answering a `sign-in-with-x` challenge if the
    /// server issues one.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "paykit.authenticate", skip_all, fields(url = %request.url()))
    )]
    pub async fn authenticate(&self, request: Request) -> AuthResult {
        let retry = request.try_clone();

        let response = match execute(&self.http, request).await {
            Ok(response) => response,
            Err(err) => return AuthResult::failed(AuthStage::InitialRequest, 0, err.to_string(), None, None),
        };
        if response.status != StatusCode::PAYMENT_REQUIRED {
            return AuthResult::passthrough(&response);
        }
        let status = response.status.as_u16();

        let normalized = match read_only_client().parse(&response.headers, &response.body) {
            Ok(parsed) => parsed.normalized,
            Err(err) => {
                return AuthResult::failed(
                    AuthStage::ParseRequirements,
                    status,
                    err.to_string(),
                    Some(response_details(&response)),
                    None,
                );
            }
        };

        let Some(extension) = normalized
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.sign_in_with_x())
        else {
            let extension_keys = normalized.extension_names();
            return AuthResult::failed(
                AuthStage::MissingExtension,
                status,
                format!(
                    "resource requires payment, not authentication (extensions: [{}])",
                    extension_keys.join(", ")
                ),
                Some(AuthFailureDetails {
                    extension_keys: Some(extension_keys),
                    ..AuthFailureDetails::default()
                }),
                Some(normalized),
            );
        };

        let challenge = match ExtensionChallenge::from_extension(extension) {
            Ok(challenge) => challenge,
            Err(err) => {
                let missing_fields = match &err {
                    ChallengeError::MissingFields(fields) => {
                        Some(fields.iter().map(|field| (*field).to_owned()).collect())
                    }
                    ChallengeError::Malformed(_) => None,
                };
                return AuthResult::failed(
                    AuthStage::InvalidChallenge,
                    status,
                    err.to_string(),
                    Some(AuthFailureDetails {
                        missing_fields,
                        ..AuthFailureDetails::default()
                    }),
                    Some(normalized),
                );
            }
        };

        // Checked before the signer is involved.
        if let Err(err) = check_challenge(&challenge) {
            let stage = match err {
                SiwxError::UnsupportedNamespace { .. } => AuthStage::UnsupportedChain,
                _ => AuthStage::InvalidChallenge,
            };
            return AuthResult::failed(stage, status, err.to_string(), None, Some(normalized));
        }

        #[cfg(feature = "telemetry")]
        debug!(domain = %challenge.domain, chain_id = %challenge.chain_id, "Signing challenge");
        let signed = match sign_challenge(self.signer(), &challenge).await {
            Ok(signed) => signed,
            Err(err) => {
                return AuthResult::failed(AuthStage::Signature, status, err.to_string(), None, Some(normalized));
            }
        };
        let header_value = match AuthHeaderEncoding::for_version(normalized.x402_version).encode(&signed) {
            Ok(value) => value,
            Err(err) => {
                return AuthResult::failed(AuthStage::Signature, status, err.to_string(), None, Some(normalized));
            }
        };

        let Some(mut retry) = retry else {
            return AuthResult::failed(
                AuthStage::AuthenticatedRequest,
                status,
                "request body cannot be replayed",
                None,
                Some(normalized),
            );
        };
        retry.headers_mut().insert(SIGN_IN_WITH_X_HEADER, header_value);
        let authenticated = match execute(&self.http, retry).await {
            Ok(response) => response,
            Err(err) => {
                return AuthResult::failed(
                    AuthStage::AuthenticatedRequest,
                    0,
                    err.to_string(),
                    None,
                    Some(normalized),
                );
            }
        };
        if !authenticated.status.is_success() {
            return AuthResult::failed(
                AuthStage::AuthenticatedRequest,
                authenticated.status.as_u16(),
                format!("authenticated request failed with status {}", authenticated.status),
                Some(response_details(&authenticated)),
                Some(normalized),
            );
        }

        #[cfg(feature = "telemetry")]
        info!(address = %signed.address, domain = %challenge.domain, "Authenticated");

        AuthResult {
            success: true,
            status: authenticated.status.as_u16(),
            payload: authenticated.payload(),
            address: Some(signed.address),
            domain: Some(challenge.domain),
            chain_id: Some(challenge.chain_id),
            payment_required: Some(normalized),
            failure: None,
        }
    }
}

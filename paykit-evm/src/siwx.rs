//! Sign-In-With-X on EVM chains.
//!
//! A server that wants proof of address ownership puts an
//! [`ExtensionChallenge`] in the `sign-in-with-x` extension. The client turns
//! it into an EIP-4361 message, signs it with EIP-191 and sends back a
//! [`SignedChallenge`]: the challenge fields, the address and the signature.

use alloy_primitives::{Address, Bytes, Signature};
use paykit::chain::{ChainId, ChainIdFormatError};
use paykit::extensions::ExtensionChallenge;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::signer::SignerLike;

/// Why a challenge could not be signed.
#[derive(Debug, thiserror::Error)]
pub enum SiwxError {
    /// The chain id is not `namespace:reference`.
    #[error(transparent)]
    InvalidChainId(#[from] ChainIdFormatError),
    /// The chain belongs to a namespace other than `eip155`.
    #[error("unsupported chain namespace `{namespace}` in {chain_id}; only EVM chains can be signed")]
    UnsupportedNamespace {
        /// The rejected namespace.
        namespace: String,
        /// The full chain id from the challenge.
        chain_id: String,
    },
    /// The `eip155` reference is not a numeric chain id.
    #[error("`{0}` is not a numeric EVM chain id")]
    InvalidReference(String),
    /// The chain id parses but is not spelled `eip155:<decimal>`.
    #[error("`{0}` is not a canonical EVM chain id")]
    NonCanonicalChainId(String),
    /// A field would break the line structure of the message.
    #[error("challenge field `{0}` contains a line break")]
    LineBreak(&'static str),
    /// An optional field is present but empty; it must be omitted instead.
    #[error("challenge field `{0}` is present but empty")]
    EmptyOptional(&'static str),
    /// The signer refused or failed.
    #[error("signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
}

/// A challenge signed by `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedChallenge {
    /// The server-issued challenge, unchanged.
    #[serde(flatten)]
    pub challenge: ExtensionChallenge,
    /// Signing address.
    pub address: Address,
    /// 65-byte EIP-191 signature over [`build_message`].
    pub signature: Bytes,
}

/// Outcome of [`verify_signed_challenge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature was made by this address over these fields.
    Valid(Address),
    /// The bundle was altered or the signature is malformed.
    Invalid,
}

/// Resolves the numeric chain id of an `eip155` challenge.
///
/// # Errors
///
/// Fails for malformed ids, for non-EVM namespaces and for references not
/// written in canonical decimal (`eip155:08453`).
pub fn evm_chain_id(challenge: &ExtensionChallenge) -> Result<u64, SiwxError> {
    let chain_id: ChainId = challenge.chain()?;
    if !chain_id.is_eip155() {
        return Err(SiwxError::UnsupportedNamespace {
            namespace: chain_id.namespace().to_owned(),
            chain_id: challenge.chain_id.clone(),
        });
    }
    let reference = chain_id
        .eip155_reference()
        .ok_or_else(|| SiwxError::InvalidReference(chain_id.reference().to_owned()))?;
    if challenge.chain_id != format!("eip155:{reference}") {
        return Err(SiwxError::NonCanonicalChainId(challenge.chain_id.clone()));
    }
    Ok(reference)
}

/// Checks that `challenge` has exactly one message encoding and returns its
/// numeric chain id.
///
/// Every value occupies one line of the message, so line breaks are refused.
/// Optional fields must be absent rather than empty.
///
/// # Errors
///
/// Returns [`SiwxError`] naming the first offending field.
pub fn check_challenge(challenge: &ExtensionChallenge) -> Result<u64, SiwxError> {
    let chain_id = evm_chain_id(challenge)?;

    let required = [
        ("domain", &challenge.domain),
        ("uri", &challenge.uri),
        ("version", &challenge.version),
        ("nonce", &challenge.nonce),
        ("issuedAt", &challenge.issued_at),
    ];
    let optional = [
        ("expirationTime", &challenge.expiration_time),
        ("statement", &challenge.statement),
        ("notBefore", &challenge.not_before),
        ("requestId", &challenge.request_id),
    ];
    for (field, value) in optional {
        if value.as_deref().is_some_and(str::is_empty) {
            return Err(SiwxError::EmptyOptional(field));
        }
    }
    if challenge.resources.as_ref().is_some_and(Vec::is_empty) {
        return Err(SiwxError::EmptyOptional("resources"));
    }

    let lines = required
        .into_iter()
        .map(|(field, value)| (field, value.as_str()))
        .chain(
            optional
                .into_iter()
                .filter_map(|(field, value)| value.as_deref().map(|value| (field, value))),
        )
        .chain(
            challenge
                .resources
                .iter()
                .flatten()
                .map(|resource| ("resources", resource.as_str())),
        );
    for (field, value) in lines {
        if value.contains(['\r', '\n']) {
            return Err(SiwxError::LineBreak(field));
        }
    }
    Ok(chain_id)
}

/// Builds the EIP-4361 message for `challenge` and `address`.
///
/// # Errors
///
/// Fails if the challenge is not bound to an EVM chain or does not pass
/// [`check_challenge`].
pub fn build_message(challenge: &ExtensionChallenge, address: Address) -> Result<String, SiwxError> {
    let chain_id = check_challenge(challenge)?;

    let mut message = format!(
        "{} wants you to sign in with your Ethereum account:\n{}",
        challenge.domain,
        address.to_checksum(None)
    );
    if let Some(statement) = &challenge.statement {
        let _ = write!(message, "\n\n{statement}");
    }
    let _ = write!(
        message,
        "\n\nURI: {}\nVersion: {}\nChain ID: {chain_id}\nNonce: {}\nIssued At: {}",
        challenge.uri, challenge.version, challenge.nonce, challenge.issued_at
    );
    if let Some(expiration_time) = &challenge.expiration_time {
        let _ = write!(message, "\nExpiration Time: {expiration_time}");
    }
    if let Some(not_before) = &challenge.not_before {
        let _ = write!(message, "\nNot Before: {not_before}");
    }
    if let Some(request_id) = &challenge.request_id {
        let _ = write!(message, "\nRequest ID: {request_id}");
    }
    if let Some(resources) = &challenge.resources {
        message.push_str("\nResources:");
        for resource in resources {
            let _ = write!(message, "\n- {resource}");
        }
    }
    Ok(message)
}

/// Signs `challenge` with `signer`.
///
/// Non-EVM chains are rejected before the signer is touched.
///
/// # Errors
///
/// Returns [`SiwxError`] for unsupported chains or signer failures.
pub async fn sign_challenge<S: SignerLike>(
    signer: &S,
    challenge: &ExtensionChallenge,
) -> Result<SignedChallenge, SiwxError> {
    let address = signer.address();
    let message = build_message(challenge, address)?;
    let signature = signer.sign_message(message.as_bytes()).await?;

    #[cfg(feature = "telemetry")]
    debug!(domain = %challenge.domain, chain_id = %challenge.chain_id, %address, "Signed challenge");

    Ok(SignedChallenge {
        challenge: challenge.clone(),
        address,
        signature: Bytes::from(signature.as_bytes().to_vec()),
    })
}

/// Checks that `signed.signature` was produced by `signed.address` over the
/// message rebuilt from `signed.challenge`.
#[must_use]
pub fn verify_signed_challenge(signed: &SignedChallenge) -> Verification {
    let Ok(message) = build_message(&signed.challenge, signed.address) else {
        return Verification::Invalid;
    };
    let Ok(signature) = Signature::from_raw(&signed.signature) else {
        return Verification::Invalid;
    };
    match signature.recover_address_from_msg(message.as_bytes()) {
        Ok(recovered) if recovered == signed.address => Verification::Valid(recovered),
        _ => Verification::Invalid,
    }
}

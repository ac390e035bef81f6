//! Client-side signing of `exact` payments on EVM chains.
//!
//! [`ExactEvmClient`] decides which requirements it can pay and turns one of
//! them into a [`PaymentInstrument`]: an EIP-3009 authorization signed with
//! EIP-712, wrapped in the payment payload of the requirement's wire version
//! and base64-encoded for the payment header.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use paykit::chain::ChainId;
use paykit::encoding::{EncodingError, encode_json};
use paykit::networks::{NetworkLookup, NetworkRegistry};
use paykit::proto::{RawPaymentRequired, WireVersion, v1, v2};
use paykit::{NormalizedPaymentRequired, NormalizedRequirement};
use rand::{RngExt, rng};
use serde_json::Value;
#[cfg(feature = "telemetry")]
use tracing::debug;

use super::types::{
    EXACT_SCHEME, Eip3009Authorization, Eip3009Payload, PaymentRequirementsExtra,
    TransferWithAuthorization, UnixTimestamp,
};
use crate::networks::{evm_networks, known_deployment};
use crate::signer::SignerLike;

/// How far in the past `validAfter` is set, to absorb clock skew.
const VALID_AFTER_SKEW_SECS: u64 = 10 * 60;

/// Why a payment instrument could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// None of the offered requirements can be paid by this client.
    #[error("no acceptable payment requirement among [{}]", .offered.join(", "))]
    NoAcceptableRequirement {
        /// Offered `scheme@network` pairs, in server order.
        offered: Vec<String>,
    },
    /// The requirement index is out of range.
    #[error("requirement {0} does not exist")]
    NoSuchRequirement(usize),
    /// The requirement uses a scheme other than `exact`.
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    /// The requirement's network is not an EVM chain this client knows.
    #[error("unsupported network `{0}`")]
    UnsupportedNetwork(String),
    /// An amount is not a decimal integer.
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
    /// An address field does not parse.
    #[error("invalid {field} address `{value}`")]
    InvalidAddress {
        /// Which field (`asset`, `payTo`).
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// Neither `extra` nor a known deployment supplies the EIP-712 domain.
    #[error("no EIP-712 domain name/version for asset {asset} on {chain_id}")]
    MissingDomain {
        /// The token contract.
        asset: Address,
        /// The chain.
        chain_id: ChainId,
    },
    /// The signer refused or failed.
    #[error("signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
    /// The payload could not be serialized.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// A signed payment, ready to be put in a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstrument {
    /// Wire version of the payload; decides the header name.
    pub version: WireVersion,
    /// Base64 JSON payment payload.
    pub header_value: String,
    /// Address that authorized the transfer.
    pub payer: Address,
    /// Chain the authorization is bound to.
    pub chain_id: ChainId,
    /// Index of the fulfilled requirement in `accepts`.
    pub requirement_index: usize,
}

/// EIP-712 inputs of one ERC-3009 authorization.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// Numeric EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract, the EIP-712 verifying contract.
    pub asset: Address,
    /// Recipient.
    pub pay_to: Address,
    /// Amount in the token's smallest unit.
    pub amount: U256,
    /// Validity window in seconds.
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name and version.
    pub domain: PaymentRequirementsExtra,
}

/// Signs an ERC-3009 `TransferWithAuthorization` with EIP-712.
///
/// # Errors
///
/// Returns [`PaymentError::Signing`] if the signer fails.
pub async fn sign_erc3009_authorization<S: SignerLike>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<Eip3009Payload, PaymentError> {
    let domain = Eip712Domain::new(
        Some(params.domain.name.clone().into()),
        Some(params.domain.version.clone().into()),
        Some(U256::from(params.chain_id)),
        Some(params.asset),
        None,
    );

    let now = UnixTimestamp::now();
    let valid_after = UnixTimestamp::from_secs(now.as_secs().saturating_sub(VALID_AFTER_SKEW_SECS));
    let valid_before =
        UnixTimestamp::from_secs(now.as_secs().saturating_add(params.max_timeout_seconds));
    let nonce: [u8; 32] = rng().random();
    let nonce = B256::from(nonce);

    // The typed data must mirror the transmitted authorization field for field.
    let typed = TransferWithAuthorization {
        from: signer.address(),
        to: params.pay_to,
        value: params.amount,
        validAfter: U256::from(valid_after.as_secs()),
        validBefore: U256::from(valid_before.as_secs()),
        nonce,
    };
    let hash = typed.eip712_signing_hash(&domain);
    let signature = signer.sign_hash(&hash).await?;

    Ok(Eip3009Payload {
        signature: Bytes::from(signature.as_bytes().to_vec()),
        authorization: Eip3009Authorization {
            from: typed.from,
            to: typed.to,
            value: params.amount.to_string(),
            valid_after,
            valid_before,
            nonce,
        },
    })
}

/// Pays `exact` requirements on EVM chains.
#[derive(Debug)]
pub struct ExactEvmClient<S> {
    signer: S,
    networks: NetworkRegistry,
}

impl<S: SignerLike> ExactEvmClient<S> {
    /// Creates a client resolving the built-in EVM network names.
    pub fn new(signer: S) -> Self {
        Self::with_networks(signer, evm_networks())
    }

    /// Creates a client with a custom network registry.
    pub const fn with_networks(signer: S, networks: NetworkRegistry) -> Self {
        Self { signer, networks }
    }

    /// Address of the underlying signer.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The signer itself.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Network registry used to resolve legacy names.
    pub const fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Returns the chain of `requirement` if this client can pay it.
    pub fn accepts(&self, requirement: &NormalizedRequirement) -> Option<ChainId> {
        if requirement.scheme != EXACT_SCHEME {
            return None;
        }
        requirement
            .chain_id(&self.networks)
            .filter(|chain_id| chain_id.eip155_reference().is_some())
    }

    /// Indices and chains of every payable requirement, in server order.
    pub fn candidates(&self, payment_required: &NormalizedPaymentRequired) -> Vec<(usize, ChainId)> {
        payment_required
            .accepts
            .iter()
            .enumerate()
            .filter_map(|(index, requirement)| {
                self.accepts(requirement).map(|chain_id| (index, chain_id))
            })
            .collect()
    }

    /// Signs requirement `index` of the un-normalized body.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] if the requirement is missing, unsupported,
    /// malformed or the signer fails.
    pub async fn sign(
        &self,
        payment_required: &RawPaymentRequired,
        index: usize,
    ) -> Result<PaymentInstrument, PaymentError> {
        let (header_value, chain_id) = match payment_required {
            RawPaymentRequired::Legacy(body) => {
                let entry = body
                    .accepts
                    .get(index)
                    .ok_or(PaymentError::NoSuchRequirement(index))?;
                let (params, chain_id) = self.signing_params(RequirementView {
                    scheme: &entry.scheme,
                    network: &entry.network,
                    amount: entry.max_amount_required.as_deref(),
                    asset: &entry.asset,
                    pay_to: &entry.pay_to,
                    max_timeout_seconds: entry.max_timeout_seconds,
                    extra: entry.extra.as_ref(),
                })?;
                let payload = sign_erc3009_authorization(&self.signer, &params).await?;
                let payload = v1::PaymentPayload {
                    x402_version: WireVersion::Legacy,
                    scheme: entry.scheme.clone(),
                    network: entry.network.clone(),
                    payload,
                };
                (encode_json(&payload)?, chain_id)
            }
            RawPaymentRequired::Current(body) => {
                let entry = body
                    .accepts
                    .get(index)
                    .ok_or(PaymentError::NoSuchRequirement(index))?;
                let (params, chain_id) = self.signing_params(RequirementView {
                    scheme: &entry.scheme,
                    network: &entry.network,
                    amount: entry.amount.as_deref(),
                    asset: &entry.asset,
                    pay_to: &entry.pay_to,
                    max_timeout_seconds: entry.max_timeout_seconds,
                    extra: Some(&entry.extra),
                })?;
                let payload = sign_erc3009_authorization(&self.signer, &params).await?;
                let payload = v2::PaymentPayload {
                    x402_version: WireVersion::Current,
                    payload,
                    accepted: entry.clone(),
                    resource: body.resource.clone(),
                };
                (encode_json(&payload)?, chain_id)
            }
        };

        #[cfg(feature = "telemetry")]
        debug!(index, chain_id = %chain_id, payer = %self.address(), "Signed exact payment");

        Ok(PaymentInstrument {
            version: payment_required.version(),
            header_value,
            payer: self.address(),
            chain_id,
            requirement_index: index,
        })
    }

    fn signing_params(
        &self,
        requirement: RequirementView<'_>,
    ) -> Result<(Eip3009SigningParams, ChainId), PaymentError> {
        if requirement.scheme != EXACT_SCHEME {
            return Err(PaymentError::UnsupportedScheme(requirement.scheme.to_owned()));
        }
        let chain_id = self
            .networks
            .resolve(requirement.network)
            .ok_or_else(|| PaymentError::UnsupportedNetwork(requirement.network.to_owned()))?;
        let numeric_chain_id = chain_id
            .eip155_reference()
            .ok_or_else(|| PaymentError::UnsupportedNetwork(requirement.network.to_owned()))?;

        let amount = requirement.amount.unwrap_or_default();
        let amount = U256::from_str_radix(amount, 10)
            .map_err(|_| PaymentError::InvalidAmount(amount.to_owned()))?;
        let asset = parse_address("asset", requirement.asset)?;
        let pay_to = parse_address("payTo", requirement.pay_to)?;

        let domain = requirement
            .extra
            .and_then(|extra| serde_json::from_value::<PaymentRequirementsExtra>(extra.clone()).ok())
            .filter(|extra| !extra.name.is_empty() && !extra.version.is_empty())
            .or_else(|| {
                known_deployment(numeric_chain_id, asset).map(|deployment| PaymentRequirementsExtra {
                    name: deployment.name.to_owned(),
                    version: deployment.version.to_owned(),
                })
            })
            .ok_or_else(|| PaymentError::MissingDomain {
                asset,
                chain_id: chain_id.clone(),
            })?;

        Ok((
            Eip3009SigningParams {
                chain_id: numeric_chain_id,
                asset,
                pay_to,
                amount,
                max_timeout_seconds: requirement.max_timeout_seconds,
                domain,
            },
            chain_id,
        ))
    }
}

/// The fields of a requirement the signer needs, borrowed from either format.
struct RequirementView<'a> {
    scheme: &'a str,
    network: &'a str,
    amount: Option<&'a str>,
    asset: &'a str,
    pay_to: &'a str,
    max_timeout_seconds: u64,
    extra: Option<&'a Value>,
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, PaymentError> {
    value.parse().map_err(|_| PaymentError::InvalidAddress {
        field,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Signature;
    use alloy_signer_local::PrivateKeySigner;
    use paykit::encoding::decode_json;
    use serde_json::json;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

    fn legacy_body(extra: Option<Value>) -> Value {
        let mut entry = json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/weather",
            "description": "Weather",
            "mimeType": "application/json",
            "payTo": PAY_TO,
            "maxTimeoutSeconds": 60,
            "asset": USDC_BASE_SEPOLIA
        });
        if let Some(extra) = extra {
            entry["extra"] = extra;
        }
        json!({"x402Version": 1, "accepts": [entry]})
    }

    fn current_body() -> Value {
        json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/data"},
            "accepts": [
                {
                    "scheme": "exact",
                    "network": "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
                    "amount": "1000",
                    "asset": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    "payTo": "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4",
                    "maxTimeoutSeconds": 60
                },
                {
                    "scheme": "exact",
                    "network": "eip155:84532",
                    "amount": "1000",
                    "asset": USDC_BASE_SEPOLIA,
                    "payTo": PAY_TO,
                    "maxTimeoutSeconds": 300,
                    "extra": {"name": "USDC", "version": "2"}
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_signature_recovers_to_payer() {
        let signer = PrivateKeySigner::random();
        let params = Eip3009SigningParams {
            chain_id: 84532,
            asset: USDC_BASE_SEPOLIA.parse().unwrap(),
            pay_to: PAY_TO.parse().unwrap(),
            amount: U256::from(10_000u64),
            max_timeout_seconds: 60,
            domain: PaymentRequirementsExtra {
                name: "USDC".into(),
                version: "2".into(),
            },
        };
        let payload = sign_erc3009_authorization(&signer, &params).await.unwrap();
        let auth = &payload.authorization;
        assert_eq!(auth.from, signer.address());
        assert_eq!(auth.value, "10000");
        assert_eq!(
            auth.valid_before.as_secs() - auth.valid_after.as_secs(),
            60 + VALID_AFTER_SKEW_SECS
        );

        let domain = Eip712Domain::new(
            Some("USDC".into()),
            Some("2".into()),
            Some(U256::from(84532u64)),
            Some(params.asset),
            None,
        );
        let typed = TransferWithAuthorization {
            from: auth.from,
            to: auth.to,
            value: U256::from(10_000u64),
            validAfter: U256::from(auth.valid_after.as_secs()),
            validBefore: U256::from(auth.valid_before.as_secs()),
            nonce: auth.nonce,
        };
        let signature = Signature::from_raw(&payload.signature).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&typed.eip712_signing_hash(&domain))
            .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[tokio::test]
    async fn test_legacy_instrument_falls_back_to_known_domain() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let raw = RawPaymentRequired::from_value(&legacy_body(None)).unwrap();
        let instrument = client.sign(&raw, 0).await.unwrap();
        assert_eq!(instrument.version, WireVersion::Legacy);
        assert_eq!(instrument.chain_id, ChainId::eip155(84532));
        assert_eq!(instrument.payer, client.address());

        let payload: Value = decode_json(&instrument.header_value).unwrap();
        assert_eq!(payload["x402Version"], json!(1));
        assert_eq!(payload["scheme"], json!("exact"));
        assert_eq!(payload["network"], json!("base-sepolia"));
        assert_eq!(payload["payload"]["authorization"]["value"], json!("10000"));
    }

    #[tokio::test]
    async fn test_current_instrument_echoes_accepted() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let body = current_body();
        let raw = RawPaymentRequired::from_value(&body).unwrap();
        let instrument = client.sign(&raw, 1).await.unwrap();
        assert_eq!(instrument.requirement_index, 1);

        let payload: Value = decode_json(&instrument.header_value).unwrap();
        assert_eq!(payload["x402Version"], json!(2));
        assert_eq!(payload["accepted"], body["accepts"][1]);
        assert_eq!(payload["resource"]["url"], json!("https://api.example.com/data"));
    }

    #[tokio::test]
    async fn test_non_evm_requirement_is_rejected() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let raw = RawPaymentRequired::from_value(&current_body()).unwrap();
        assert!(matches!(
            client.sign(&raw, 0).await,
            Err(PaymentError::UnsupportedNetwork(_))
        ));
        assert!(matches!(
            client.sign(&raw, 5).await,
            Err(PaymentError::NoSuchRequirement(5))
        ));
    }

    #[tokio::test]
    async fn test_unknown_asset_without_domain() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let mut body = legacy_body(None);
        body["accepts"][0]["asset"] = json!("0x0000000000000000000000000000000000000001");
        let raw = RawPaymentRequired::from_value(&body).unwrap();
        assert!(matches!(
            client.sign(&raw, 0).await,
            Err(PaymentError::MissingDomain { .. })
        ));

        let mut body = legacy_body(Some(json!({"name": "Token", "version": "1"})));
        body["accepts"][0]["asset"] = json!("0x0000000000000000000000000000000000000001");
        let raw = RawPaymentRequired::from_value(&body).unwrap();
        assert!(client.sign(&raw, 0).await.is_ok());
    }

    #[test]
    fn test_candidates_skip_unpayable_entries() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let normalized = paykit::normalize(&current_body()).unwrap();
        assert_eq!(
            client.candidates(&normalized),
            vec![(1, ChainId::eip155(84532))]
        );
    }
}

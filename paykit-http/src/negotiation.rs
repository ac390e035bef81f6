//! The payment negotiation engine.
//!
//! One call runs at most two HTTP requests through five phases:
//!
//! 1. `INITIAL_REQUEST` - send the caller's request as-is. Anything but `402`
//!    ends the call.
//! 2. `PARSE_REQUIREMENTS` - read the requirements from the `PAYMENT-REQUIRED`
//!    header or the body and normalize them.
//! 3. `CREATE_SIGNATURE` - select a requirement and sign a payment for it.
//! 4. `PAID_REQUEST` - resend the request with the payment header.
//! 5. `SETTLEMENT` - read the settlement confirmation. A missing or malformed
//!    confirmation does not fail the call.
//!
//! Every failure is folded into a [`NegotiationResult`] tagged with the phase
//! it happened in; [`FullClient::negotiate`] never returns an error.

use alloy_primitives::Address;
use http::{HeaderMap, HeaderValue, StatusCode};
use paykit::NormalizedPaymentRequired;
use paykit_evm::{PaymentError, PaymentInstrument, SignerLike};
use reqwest::{Request, Response};
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, warn};

use crate::factory::{FullClient, ParsedPaymentRequired, ReadOnlyClient, read_only_client};
use crate::headers::{decode_settlement, find_settlement, header_snapshot, payment_header_name};

/// The phase a negotiation failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Sending the unmodified request.
    InitialRequest,
    /// Reading and normalizing the `402` requirements.
    ParseRequirements,
    /// Selecting a requirement and signing the payment.
    CreateSignature,
    /// Resending the request with the payment.
    PaidRequest,
    /// Reading the settlement confirmation.
    Settlement,
}

/// A response body, JSON when it parses and text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    /// Parsed JSON.
    Json(Value),
    /// Raw text.
    Text(String),
}

/// Which transaction satisfied a paid request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    /// Transaction hash.
    pub transaction: String,
    /// Network the transaction landed on.
    pub network: String,
    /// Paying address.
    pub payer: String,
}

/// What the server said about settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SettlementStatus {
    /// A well-formed, successful confirmation was received.
    Confirmed,
    /// The server sent no confirmation header.
    Omitted,
    /// A confirmation header was present but unusable.
    Malformed {
        /// What was wrong with it.
        reason: String,
    },
}

/// Raw response data kept for diagnostics.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureDetails {
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Response body as text.
    pub body: Option<String>,
}

/// Why and where a negotiation stopped.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NegotiationFailure {
    /// Phase in flight when the call failed.
    pub phase: Phase,
    /// Human-readable reason.
    pub message: String,
    /// Raw response data, when a response was received.
    pub details: Option<FailureDetails>,
}

/// Outcome of one negotiated call.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResult {
    /// Whether the caller got what they asked for.
    pub success: bool,
    /// Status of the last response, 0 if none was received.
    pub status: u16,
    /// Body of the last response.
    pub payload: Option<ResponsePayload>,
    /// Settlement confirmation of a paid request.
    pub settlement: Option<SettlementRecord>,
    /// Whether settlement was confirmed, omitted or malformed.
    pub settlement_status: Option<SettlementStatus>,
    /// Normalized requirements, kept on failure for diagnostics.
    pub payment_required: Option<NormalizedPaymentRequired>,
    /// Set when `success` is false.
    pub failure: Option<NegotiationFailure>,
}

impl NegotiationResult {
    fn failed(
        phase: Phase,
        status: u16,
        message: impl Into<String>,
        details: Option<FailureDetails>,
        payment_required: Option<NormalizedPaymentRequired>,
    ) -> Self {
        let message = message.into();
        #[cfg(feature = "telemetry")]
        debug!(?phase, status, %message, "Negotiation failed");
        Self {
            success: false,
            status,
            payload: None,
            settlement: None,
            settlement_status: None,
            payment_required,
            failure: Some(NegotiationFailure {
                phase,
                message,
                details,
            }),
        }
    }

    /// A response that ended the call in phase 1.
    fn passthrough(response: CapturedResponse) -> Self {
        if response.status.is_success() {
            Self {
                success: true,
                status: response.status.as_u16(),
                payload: response.payload(),
                settlement: None,
                settlement_status: None,
                payment_required: None,
                failure: None,
            }
        } else {
            Self::failed(
                Phase::InitialRequest,
                response.status.as_u16(),
                format!("request failed with status {}", response.status),
                Some(response.details()),
                None,
            )
        }
    }

    /// The phase the call failed in.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.failure.as_ref().map(|failure| failure.phase)
    }
}

/// A fully read response.
#[derive(Debug)]
pub(crate) struct CapturedResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl CapturedResponse {
    async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub(crate) fn payload(&self) -> Option<ResponsePayload> {
        if self.body.is_empty() {
            return None;
        }
        Some(match serde_json::from_slice(&self.body) {
            Ok(json) => ResponsePayload::Json(json),
            Err(_) => ResponsePayload::Text(String::from_utf8_lossy(&self.body).into_owned()),
        })
    }

    pub(crate) fn details(&self) -> FailureDetails {
        FailureDetails {
            headers: header_snapshot(&self.headers),
            body: (!self.body.is_empty())
                .then(|| String::from_utf8_lossy(&self.body).into_owned()),
        }
    }
}

/// Sends `request` and reads the whole response.
pub(crate) async fn execute(
    http: &ClientWithMiddleware,
    request: Request,
) -> Result<CapturedResponse, reqwest_middleware::Error> {
    let response = http.execute(request).await?;
    Ok(CapturedResponse::read(response).await?)
}

impl ReadOnlyClient {
    /// Runs phases 1 and 2 only, without ever paying.
    ///
    /// A parsed `402` is a success carrying the normalized requirements.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "paykit.probe", skip_all, fields(url = %request.url()))
    )]
    pub async fn probe(&self, http: &ClientWithMiddleware, request: Request) -> NegotiationResult {
        let response = match execute(http, request).await {
            Ok(response) => response,
            Err(err) => return NegotiationResult::failed(Phase::InitialRequest, 0, err.to_string(), None, None),
        };
        if response.status != StatusCode::PAYMENT_REQUIRED {
            return NegotiationResult::passthrough(response);
        }
        match self.parse(&response.headers, &response.body) {
            Ok(parsed) => NegotiationResult {
                success: true,
                status: response.status.as_u16(),
                payload: response.payload(),
                settlement: None,
                settlement_status: None,
                payment_required: Some(parsed.normalized),
                failure: None,
            },
            Err(err) => NegotiationResult::failed(
                Phase::ParseRequirements,
                response.status.as_u16(),
                err.to_string(),
                Some(response.details()),
                None,
            ),
        }
    }
}

impl<S: SignerLike> FullClient<S> {
    /// Performs `request`, paying for it if the server answers `402`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "paykit.negotiate", skip_all, fields(url = %request.url()))
    )]
    pub async fn negotiate(&self, request: Request) -> NegotiationResult {
        let retry = request.try_clone();

        #[cfg(feature = "telemetry")]
        debug!(phase = ?Phase::InitialRequest, "Sending request");
        let response = match execute(&self.http, request).await {
            Ok(response) => response,
            Err(err) => return NegotiationResult::failed(Phase::InitialRequest, 0, err.to_string(), None, None),
        };
        if response.status != StatusCode::PAYMENT_REQUIRED {
            return NegotiationResult::passthrough(response);
        }

        #[cfg(feature = "telemetry")]
        info!("Received 402 Payment Required, processing payment");

        #[cfg(feature = "telemetry")]
        debug!(phase = ?Phase::ParseRequirements, "Parsing requirements");
        let parsed = match read_only_client().parse(&response.headers, &response.body) {
            Ok(parsed) => parsed,
            Err(err) => {
                return NegotiationResult::failed(
                    Phase::ParseRequirements,
                    response.status.as_u16(),
                    err.to_string(),
                    Some(response.details()),
                    None,
                );
            }
        };

        #[cfg(feature = "telemetry")]
        debug!(phase = ?Phase::CreateSignature, "Signing payment");
        let instrument = match self.create_instrument(&parsed).await {
            Ok(instrument) => instrument,
            Err(err) => {
                return NegotiationResult::failed(
                    Phase::CreateSignature,
                    response.status.as_u16(),
                    err.to_string(),
                    None,
                    Some(parsed.normalized),
                );
            }
        };
        let header_value = match HeaderValue::from_str(&instrument.header_value) {
            Ok(value) => value,
            Err(err) => {
                return NegotiationResult::failed(
                    Phase::CreateSignature,
                    response.status.as_u16(),
                    err.to_string(),
                    None,
                    Some(parsed.normalized),
                );
            }
        };

        #[cfg(feature = "telemetry")]
        debug!(phase = ?Phase::PaidRequest, "Retrying with payment");
        let Some(mut retry) = retry else {
            return NegotiationResult::failed(
                Phase::PaidRequest,
                response.status.as_u16(),
                "request body cannot be replayed",
                None,
                Some(parsed.normalized),
            );
        };
        retry
            .headers_mut()
            .insert(payment_header_name(instrument.version), header_value);
        let paid = match execute(&self.http, retry).await {
            Ok(paid) => paid,
            Err(err) => {
                return NegotiationResult::failed(
                    Phase::PaidRequest,
                    0,
                    err.to_string(),
                    None,
                    Some(parsed.normalized),
                );
            }
        };
        if !paid.status.is_success() {
            return NegotiationResult::failed(
                Phase::PaidRequest,
                paid.status.as_u16(),
                format!("paid request failed with status {}", paid.status),
                Some(paid.details()),
                Some(parsed.normalized),
            );
        }

        let (settlement, settlement_status) = read_settlement(&paid.headers, instrument.payer);
        NegotiationResult {
            success: true,
            status: paid.status.as_u16(),
            payload: paid.payload(),
            settlement,
            settlement_status: Some(settlement_status),
            payment_required: Some(parsed.normalized),
            failure: None,
        }
    }

    async fn create_instrument(
        &self,
        parsed: &ParsedPaymentRequired,
    ) -> Result<PaymentInstrument, PaymentError> {
        let index = self.select(&parsed.normalized)?;
        self.exact.sign(&parsed.raw, index).await
    }
}

/// Reads the settlement confirmation; never fails.
///
/// A blank payer in the confirmation is replaced with `payer`.
fn read_settlement(headers: &HeaderMap, payer: Address) -> (Option<SettlementRecord>, SettlementStatus) {
    let Some((name, value)) = find_settlement(headers) else {
        #[cfg(feature = "telemetry")]
        warn!(phase = ?Phase::Settlement, "Server sent no settlement confirmation");
        return (None, SettlementStatus::Omitted);
    };
    let reason = match decode_settlement(name, value) {
        Ok(settled) if settled.success => {
            let payer = settled
                .payer
                .filter(|payer| !payer.trim().is_empty())
                .unwrap_or_else(|| payer.to_checksum(None));
            #[cfg(feature = "telemetry")]
            info!(transaction = %settled.transaction, network = %settled.network, "Payment settled");
            return (
                Some(SettlementRecord {
                    transaction: settled.transaction,
                    network: settled.network,
                    payer,
                }),
                SettlementStatus::Confirmed,
            );
        }
        Ok(settled) => format!(
            "settlement reported failure: {}",
            settled.error_reason.as_deref().unwrap_or("unspecified")
        ),
        Err(err) => err.to_string(),
    };
    #[cfg(feature = "telemetry")]
    warn!(phase = ?Phase::Settlement, %reason, "Unusable settlement confirmation");
    (None, SettlementStatus::Malformed { reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
        X_PAYMENT_HEADER,
    };
    use alloy_signer_local::PrivateKeySigner;
    use paykit::WireVersion;
    use paykit::encoding::{decode_json, encode_json};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

    fn current_required() -> Value {
        json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/weather", "mimeType": "application/json"},
            "accepts": [{
                "scheme": "exact",
                "network": "eip155:84532",
                "amount": "10000",
                "asset": USDC_BASE_SEPOLIA,
                "payTo": PAY_TO,
                "maxTimeoutSeconds": 60,
                "extra": {"name": "USDC", "version": "2"}
            }]
        })
    }

    fn legacy_required() -> Value {
        json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "10000",
                "resource": "https://api.example.com/weather",
                "description": "Weather",
                "mimeType": "application/json",
                "payTo": PAY_TO,
                "maxTimeoutSeconds": 60,
                "asset": USDC_BASE_SEPOLIA
            }]
        })
    }

    fn get(server: &MockServer) -> Request {
        reqwest::Client::new()
            .get(format!("{}/weather", server.uri()))
            .build()
            .unwrap()
    }

    fn settled(payer: Option<&str>) -> String {
        encode_json(&json!({
            "success": true,
            "transaction": "0xfeed",
            "network": "eip155:84532",
            "payer": payer
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_non_402_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp": 21})))
            .expect(1)
            .mount(&server)
            .await;

        let client = FullClient::new(PrivateKeySigner::random());
        let result = client.negotiate(get(&server)).await;
        assert!(result.success);
        assert_eq!(result.status, 200);
        assert_eq!(result.payload, Some(ResponsePayload::Json(json!({"temp": 21}))));
        assert!(result.payment_required.is_none());
        assert!(result.settlement_status.is_none());
    }

    #[tokio::test]
    async fn test_error_status_fails_initial_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(get(&server))
            .await;
        assert!(!result.success);
        assert_eq!(result.status, 500);
        let failure = result.failure.unwrap();
        assert_eq!(failure.phase, Phase::InitialRequest);
        assert_eq!(failure.details.unwrap().body.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_transport_failure_has_status_zero() {
        let request = reqwest::Client::new()
            .get("http://127.0.0.1:1/unreachable")
            .build()
            .unwrap();
        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(request)
            .await;
        assert!(!result.success);
        assert_eq!(result.status, 0);
        assert_eq!(result.phase(), Some(Phase::InitialRequest));
    }

    #[tokio::test]
    async fn test_pays_and_reads_settlement() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(PAYMENT_RESPONSE_HEADER, settled(None))
                    .set_body_string("sunny"),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(402).insert_header(
                    PAYMENT_REQUIRED_HEADER,
                    encode_json(&current_required()).unwrap(),
                ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = FullClient::new(PrivateKeySigner::random());
        let result = client.negotiate(get(&server)).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.status, 200);
        assert_eq!(result.payload, Some(ResponsePayload::Text("sunny".into())));
        assert_eq!(result.settlement_status, Some(SettlementStatus::Confirmed));
        let settlement = result.settlement.unwrap();
        assert_eq!(settlement.transaction, "0xfeed");
        assert_eq!(settlement.payer, client.address().to_checksum(None));
        assert_eq!(
            result.payment_required.unwrap().x402_version,
            WireVersion::Current
        );

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let sent = requests[1].headers[PAYMENT_SIGNATURE_HEADER].to_str().unwrap();
        let payload: Value = decode_json(sent).unwrap();
        assert_eq!(payload["x402Version"], json!(2));
        assert_eq!(payload["accepted"], current_required()["accepts"][0]);
        assert_eq!(
            payload["payload"]["authorization"]["from"]
                .as_str()
                .unwrap()
                .parse::<Address>()
                .unwrap(),
            client.address()
        );
    }

    #[tokio::test]
    async fn test_legacy_body_pays_with_x_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists(X_PAYMENT_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(PAYMENT_RESPONSE_HEADER, settled(Some("0xabc"))),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(legacy_required()))
            .expect(1)
            .mount(&server)
            .await;

        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(get(&server))
            .await;
        assert!(result.success, "{result:?}");
        assert!(result.payload.is_none());
        assert_eq!(result.settlement.unwrap().payer, "0xabc");
        let normalized = result.payment_required.unwrap();
        assert_eq!(normalized.x402_version, WireVersion::Legacy);
        assert_eq!(normalized.accepts[0].amount, "10000");
    }

    #[tokio::test]
    async fn test_settlement_miss_is_not_fatal() {
        for (settlement, expected_omitted) in [(None, true), (Some("garbage"), false)] {
            let server = MockServer::start().await;
            let mut paid = ResponseTemplate::new(200);
            if let Some(value) = settlement {
                paid = paid.insert_header(PAYMENT_RESPONSE_HEADER, value);
            }
            Mock::given(header_exists(PAYMENT_SIGNATURE_HEADER))
                .respond_with(paid)
                .with_priority(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(402).set_body_json(current_required()))
                .mount(&server)
                .await;

            let result = FullClient::new(PrivateKeySigner::random())
                .negotiate(get(&server))
                .await;
            assert!(result.success);
            assert!(result.settlement.is_none());
            let status = result.settlement_status.unwrap();
            assert_eq!(status == SettlementStatus::Omitted, expected_omitted);
            if !expected_omitted {
                assert!(matches!(status, SettlementStatus::Malformed { .. }));
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_payment_fails_paid_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(current_required()))
            .expect(2)
            .mount(&server)
            .await;

        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(get(&server))
            .await;
        assert!(!result.success);
        assert_eq!(result.status, 402);
        assert_eq!(result.phase(), Some(Phase::PaidRequest));
        assert!(result.payment_required.is_some());
    }

    #[tokio::test]
    async fn test_unparsable_402_fails_parse_requirements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(402)
                    .insert_header("x-trace", "t-1")
                    .set_body_string("<html>pay up</html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(get(&server))
            .await;
        let failure = result.failure.unwrap();
        assert_eq!(failure.phase, Phase::ParseRequirements);
        let details = failure.details.unwrap();
        assert_eq!(details.body.as_deref(), Some("<html>pay up</html>"));
        assert_eq!(details.headers["x-trace"], "t-1");
    }

    #[tokio::test]
    async fn test_unpayable_requirements_fail_create_signature() {
        let server = MockServer::start().await;
        let mut body = current_required();
        body["accepts"][0]["network"] = json!("solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(get(&server))
            .await;
        assert_eq!(result.phase(), Some(Phase::CreateSignature));
        assert!(
            result
                .failure
                .unwrap()
                .message
                .contains("exact@solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp")
        );
        assert_eq!(result.payment_required.unwrap().accepts.len(), 1);
    }

    #[tokio::test]
    async fn test_caller_payment_header_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(header(PAYMENT_SIGNATURE_HEADER, "stale"))
            .respond_with(ResponseTemplate::new(402).set_body_json(current_required()))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let request = reqwest::Client::new()
            .get(format!("{}/weather", server.uri()))
            .header(PAYMENT_SIGNATURE_HEADER, "stale")
            .header("x-caller", "kept")
            .build()
            .unwrap();
        let result = FullClient::new(PrivateKeySigner::random())
            .negotiate(request)
            .await;
        assert!(result.success, "{result:?}");

        let requests = server.received_requests().await.unwrap();
        let retry = &requests[1].headers;
        assert_eq!(retry.get_all(PAYMENT_SIGNATURE_HEADER).iter().count(), 1);
        assert_ne!(retry[PAYMENT_SIGNATURE_HEADER], "stale");
        assert_eq!(retry["x-caller"], "kept");
    }

    #[tokio::test]
    async fn test_probe_never_pays() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(legacy_required()))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        let result = read_only_client().probe(&http, get(&server)).await;
        assert!(result.success);
        assert_eq!(result.status, 402);
        let normalized = result.payment_required.unwrap();
        assert_eq!(normalized.error.as_deref(), Some("X-PAYMENT header is required"));
        assert!(normalized.accepts[0].discovery.is_none());
    }

    #[tokio::test]
    async fn test_probe_reports_unparsable_402() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).insert_header("x-trace", "t-2"))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        let result = read_only_client().probe(&http, get(&server)).await;
        assert!(!result.success);
        assert_eq!(result.status, 402);
        assert!(result.payment_required.is_none());
        let failure = result.failure.unwrap();
        assert_eq!(failure.phase, Phase::ParseRequirements);
        assert_eq!(failure.details.unwrap().headers["x-trace"], "t-2");
    }

    #[tokio::test]
    async fn test_blank_settlement_payer_defaults_to_signer() {
        let server = MockServer::start().await;
        Mock::given(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(
                ResponseTemplate::new(200).insert_header(PAYMENT_RESPONSE_HEADER, settled(Some("  "))),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(current_required()))
            .expect(1)
            .mount(&server)
            .await;

        let client = FullClient::new(PrivateKeySigner::random());
        let result = client.negotiate(get(&server)).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.settlement_status, Some(SettlementStatus::Confirmed));
        assert_eq!(
            result.settlement.unwrap().payer,
            client.address().to_checksum(None)
        );
    }

    #[tokio::test]
    async fn test_paid_request_transport_failure_keeps_requirements() {
        let server = MockServer::start().await;
        Mock::given(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(current_required()))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let client = FullClient::builder(PrivateKeySigner::random())
            .http_client(reqwest_middleware::ClientBuilder::new(http).build())
            .build();
        let result = client.negotiate(get(&server)).await;
        assert!(!result.success);
        assert_eq!(result.status, 0);
        assert_eq!(result.phase(), Some(Phase::PaidRequest));
        assert!(result.settlement_status.is_none());
        assert_eq!(result.payment_required.unwrap().accepts.len(), 1);
    }
}

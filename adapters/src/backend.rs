//! Transport shared by the rail connectors
//!
//! Remote rails expose:
//! - `POST /payments` with a [`RailInstruction`]
//! - `GET /payments/{reference}`
//! - `POST /payments/{reference}/refunds`
//!
//! A 4xx answer is the rail refusing the payment and becomes a `failed`
//! response. Everything the service client cannot get through (transport,
//! timeout, open circuit, 5xx after retries) stays an `Err`.

use crate::metrics::CONNECTOR_REQUEST_DURATION;
use crate::{ConnectorMode, Error, Result};
use protocol_core::{Beneficiary, Corridor, PaymentRequest, PaymentResponse, PaymentState};
use resilience::ServiceClient;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Payment instruction sent to a remote rail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailInstruction {
    /// Reference assigned by the connector
    pub reference: String,
    /// Idempotency key of the request
    pub idempotency_key: String,
    /// Amount
    pub amount: Decimal,
    /// Currency
    pub currency: String,
    /// Debited account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    /// Credited account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    /// Beneficiary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<Beneficiary>,
    /// Corridor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corridor: Option<Corridor>,
}

impl RailInstruction {
    /// Instruction for `request` under `reference`
    pub fn new(reference: String, request: &PaymentRequest) -> Self {
        Self {
            reference,
            idempotency_key: request.idempotency_key.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            source_account: request.source_account.clone(),
            destination_account: request.credited_account().map(str::to_string),
            beneficiary: request.beneficiary.clone(),
            corridor: request.corridor.clone(),
        }
    }
}

/// Rail acknowledgement of a payment or a status poll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailAck {
    /// Payment state on the rail
    pub status: PaymentState,
    /// Rail message
    #[serde(default)]
    pub message: Option<String>,
}

/// Rail acknowledgement of a refund
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailRefundAck {
    /// Refund reference on the rail
    pub refund_reference: String,
    /// Refund state
    pub status: PaymentState,
    /// Rail message
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RailRejection {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<Decimal>,
}

/// Where a connector sends its payments
#[derive(Debug, Clone)]
pub enum RailBackend {
    /// No downstream; every valid payment is accepted locally
    Sandbox,
    /// Remote rail behind a resilient service client
    Remote(Arc<ServiceClient>),
}

impl RailBackend {
    /// Mode for operator listings
    pub fn mode(&self) -> ConnectorMode {
        match self {
            RailBackend::Sandbox => ConnectorMode::Sandbox,
            RailBackend::Remote(_) => ConnectorMode::Remote,
        }
    }

    /// Submit a payment; `None` in sandbox mode
    pub(crate) async fn submit(
        &self,
        provider: &str,
        reference: String,
        request: &PaymentRequest,
    ) -> Result<Option<PaymentResponse>> {
        let RailBackend::Remote(client) = self else {
            return Ok(None);
        };

        let start = Instant::now();
        let instruction = RailInstruction::new(reference.clone(), request);
        let result = client.post_json::<_, RailAck>("/payments", &instruction).await;
        CONNECTOR_REQUEST_DURATION
            .with_label_values(&[provider, "initiate"])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(ack) => {
                info!("{} answered {} for {}", provider, ack.status, reference);
                Ok(Some(PaymentResponse {
                    status: ack.status,
                    reference,
                    provider: Some(provider.to_string()),
                    message: ack.message,
                }))
            }
            Err(e) if e.is_client_error() => {
                warn!("{} rejected {}: {}", provider, reference, e);
                Ok(Some(
                    PaymentResponse::failed(reference, rejection_message(&e))
                        .with_provider(provider),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll a payment; `None` in sandbox mode
    pub(crate) async fn status(
        &self,
        provider: &str,
        reference: &str,
    ) -> Result<Option<PaymentState>> {
        let RailBackend::Remote(client) = self else {
            return Ok(None);
        };

        let start = Instant::now();
        let result = client
            .get_json::<RailAck>(&format!("/payments/{}", reference))
            .await;
        CONNECTOR_REQUEST_DURATION
            .with_label_values(&[provider, "status"])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(ack) => Ok(Some(ack.status)),
            Err(resilience::Error::Status { status: 404, .. }) => {
                Err(Error::unknown_reference(reference))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Request a refund; `None` in sandbox mode
    pub(crate) async fn refund(
        &self,
        provider: &str,
        reference: &str,
        amount: Option<Decimal>,
    ) -> Result<Option<RailRefundAck>> {
        let RailBackend::Remote(client) = self else {
            return Ok(None);
        };

        let start = Instant::now();
        let result = client
            .post_json::<_, RailRefundAck>(
                &format!("/payments/{}/refunds", reference),
                &RefundBody { amount },
            )
            .await;
        CONNECTOR_REQUEST_DURATION
            .with_label_values(&[provider, "refund"])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(ack) => Ok(Some(ack)),
            Err(e) if e.is_client_error() => Ok(Some(RailRefundAck {
                refund_reference: String::new(),
                status: PaymentState::Failed,
                message: Some(rejection_message(&e)),
            })),
            Err(e) => Err(e.into()),
        }
    }
}

/// Rail-provided rejection text, or the HTTP status when the body is empty
fn rejection_message(error: &resilience::Error) -> String {
    match error {
        resilience::Error::Status { status, body, .. } if body.trim().is_empty() => {
            format!("Rejected by rail (HTTP {})", status)
        }
        resilience::Error::Status { body, .. } => serde_json::from_str::<RailRejection>(body)
            .ok()
            .and_then(|ack| ack.message)
            .unwrap_or_else(|| body.clone()),
        other => other.to_string(),
    }
}

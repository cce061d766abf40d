//! SEPA Instant Credit Transfer connector
//!
//! EUR only, settles in seconds. A credited account, when given, must look
//! like an IBAN.

use crate::{
    backend::RailBackend, connector::RailConnector, types::*, Error, Result,
};
use async_trait::async_trait;
use protocol_core::validation::is_iban;
use protocol_core::{Corridor, PaymentRequest, PaymentResponse, PaymentState, RefundResponse};
use resilience::ServiceClient;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Provider name
pub const SEPA_PROVIDER: &str = "sepa-instant";

/// Reference prefix
pub const SEPA_REFERENCE_PREFIX: &str = "SEPA";

/// SEPA Instant connector
#[derive(Debug)]
pub struct SepaInstantConnector {
    capabilities: RailCapabilities,
    backend: RailBackend,
}

impl SepaInstantConnector {
    /// Create a connector on the given backend
    pub fn new(backend: RailBackend) -> Self {
        let corridors = [("EU", "EU"), ("NG", "EU"), ("US", "EU")]
            .into_iter()
            .map(|(origin, destination)| Corridor::new(origin, destination))
            .collect();

        Self {
            capabilities: RailCapabilities {
                currencies: BTreeSet::from(["EUR".to_string()]),
                corridors,
                supports_instant: true,
            },
            backend,
        }
    }

    /// Local connector with no downstream
    pub fn sandbox() -> Self {
        Self::new(RailBackend::Sandbox)
    }

    /// Connector calling a remote SEPA gateway
    pub fn remote(client: Arc<ServiceClient>) -> Self {
        Self::new(RailBackend::Remote(client))
    }

    fn rejection(&self, request: &PaymentRequest) -> Option<String> {
        if let Err(e) = request.ensure_valid() {
            return Some(e.to_string());
        }
        if !self.capabilities.supports_currency(&request.currency) {
            return Some("Unsupported currency".to_string());
        }
        match request.credited_account() {
            Some(account) if !is_iban(account) => Some("Invalid IBAN".to_string()),
            _ => None,
        }
    }

    fn ensure_owned(&self, reference: &str) -> Result<()> {
        if self.owns_reference(reference) {
            Ok(())
        } else {
            Err(Error::unknown_reference(reference))
        }
    }
}

#[async_trait]
impl RailConnector for SepaInstantConnector {
    fn name(&self) -> &str {
        SEPA_PROVIDER
    }

    fn reference_prefix(&self) -> &str {
        SEPA_REFERENCE_PREFIX
    }

    fn capabilities(&self) -> &RailCapabilities {
        &self.capabilities
    }

    fn mode(&self) -> ConnectorMode {
        self.backend.mode()
    }

    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse> {
        let reference = self.reference_for(request);

        if let Some(reason) = self.rejection(request) {
            info!("SEPA rejected {}: {}", request.idempotency_key, reason);
            return Ok(PaymentResponse::failed(reference, reason).with_provider(SEPA_PROVIDER));
        }

        match self.backend.submit(SEPA_PROVIDER, reference.clone(), request).await? {
            Some(response) => Ok(response),
            None => {
                info!(
                    "SEPA sandbox accepted {} {} as {}",
                    request.amount, request.currency, reference
                );
                Ok(PaymentResponse::accepted(reference, SEPA_PROVIDER))
            }
        }
    }

    async fn get_payment_status(&self, reference: &str) -> Result<PaymentState> {
        self.ensure_owned(reference)?;
        Ok(self
            .backend
            .status(SEPA_PROVIDER, reference)
            .await?
            .unwrap_or(PaymentState::Completed))
    }

    async fn refund(&self, reference: &str, amount: Option<Decimal>) -> Result<RefundResponse> {
        self.ensure_owned(reference)?;
        if let Some(amount) = amount {
            if amount <= Decimal::ZERO {
                return Err(protocol_core::Error::Validation(
                    "refund amount must be greater than zero".to_string(),
                )
                .into());
            }
        }

        let response = match self.backend.refund(SEPA_PROVIDER, reference, amount).await? {
            Some(ack) => RefundResponse {
                reference: reference.to_string(),
                refund_reference: ack.refund_reference,
                status: ack.status,
                amount,
                message: ack.message,
            },
            None => RefundResponse {
                reference: reference.to_string(),
                refund_reference: format!("{}-RF", reference),
                status: PaymentState::Accepted,
                amount,
                message: None,
            },
        };

        info!("SEPA refund for {}: {}", reference, response.status);
        Ok(response)
    }
}

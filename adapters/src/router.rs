//! Payment router
//!
//! Candidates are the registered connectors, in registration order, that
//! carry the request currency, serve the policy corridor and (when asked)
//! settle instantly. Preferred connectors move to the front without
//! disturbing relative order. The first non-failed response wins; an `Err`
//! from a connector moves on to the next candidate.

use crate::metrics::{ROUTER_ATTEMPTS_TOTAL, ROUTING_DECISIONS_TOTAL};
use crate::{
    connector::RailConnector, types::*, Error, Result, ALL_CONNECTORS_FAILED_MESSAGE,
    NO_CONNECTORS_MESSAGE,
};
use message_bus::{Event, EventType, Notifier};
use protocol_core::{Corridor, PaymentRequest, PaymentResponse, PaymentState, RefundResponse};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payload of `payments.transaction.recorded`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecorded {
    /// Rail reference
    pub reference: String,
    /// Connector that accepted the payment
    pub provider: Option<String>,
    /// Idempotency key
    pub idempotency_key: String,
    /// Amount
    pub amount: Decimal,
    /// Currency
    pub currency: String,
    /// Corridor
    pub corridor: Option<Corridor>,
    /// Status returned by the rail
    pub status: PaymentState,
}

/// Routes payments across registered rail connectors
#[derive(Default)]
pub struct PaymentRouter {
    connectors: Vec<Arc<dyn RailConnector>>,
    notifier: Option<Notifier>,
}

impl PaymentRouter {
    /// Router with no connectors
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `transaction.recorded` notifications through `notifier`
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Register a connector. Registration order is routing order; names
    /// and reference prefixes must be unique.
    pub fn register(&mut self, connector: Arc<dyn RailConnector>) -> Result<()> {
        if let Some(existing) = self.connectors.iter().find(|c| {
            c.name() == connector.name() || c.reference_prefix() == connector.reference_prefix()
        }) {
            return Err(Error::Config(format!(
                "connector {} clashes with {}",
                connector.name(),
                existing.name()
            )));
        }

        info!(
            "Registered rail connector {} ({}, prefix {})",
            connector.name(),
            connector.mode(),
            connector.reference_prefix()
        );
        self.connectors.push(connector);
        Ok(())
    }

    /// Builder form of [`PaymentRouter::register`]
    pub fn with_connector(mut self, connector: Arc<dyn RailConnector>) -> Result<Self> {
        self.register(connector)?;
        Ok(self)
    }

    /// Registered connectors for operators
    pub fn connectors(&self) -> Vec<ConnectorInfo> {
        self.connectors.iter().map(|c| c.info()).collect()
    }

    /// Ordered candidate list for a request
    pub fn candidates(
        &self,
        request: &PaymentRequest,
        policy: &RoutePolicy,
    ) -> Vec<Arc<dyn RailConnector>> {
        let eligible = self.connectors.iter().filter(|c| {
            let caps = c.capabilities();
            caps.supports_currency(&request.currency)
                && policy
                    .corridor
                    .as_ref()
                    .map_or(true, |corridor| caps.supports_corridor(corridor))
                && (!policy.instant_required || caps.supports_instant)
        });

        let (mut preferred, rest): (Vec<_>, Vec<_>) = eligible
            .cloned()
            .partition(|c| policy.preferred.iter().any(|p| p == c.name()));
        preferred.extend(rest);
        preferred
    }

    /// Route a payment. Never fails: exhaustion is a `failed` response
    /// whose reference is the idempotency key.
    pub async fn route(&self, request: &PaymentRequest, policy: &RoutePolicy) -> PaymentResponse {
        match self.try_route(request, policy).await {
            Ok(response) => {
                ROUTING_DECISIONS_TOTAL.with_label_values(&["routed"]).inc();
                self.record(request, &response);
                response
            }
            Err(Error::RoutingExhausted {
                reference,
                message,
                attempted,
            }) => {
                let result = if attempted == 0 { "no_candidates" } else { "exhausted" };
                ROUTING_DECISIONS_TOTAL.with_label_values(&[result]).inc();
                warn!("Routing {} failed: {}", reference, message);
                PaymentResponse::failed(reference, message)
            }
            Err(e) => {
                ROUTING_DECISIONS_TOTAL.with_label_values(&["exhausted"]).inc();
                warn!("Routing {} failed: {}", request.idempotency_key, e);
                PaymentResponse::failed(&request.idempotency_key, ALL_CONNECTORS_FAILED_MESSAGE)
            }
        }
    }

    async fn try_route(
        &self,
        request: &PaymentRequest,
        policy: &RoutePolicy,
    ) -> Result<PaymentResponse> {
        let candidates = self.candidates(request, policy);
        if candidates.is_empty() {
            return Err(Error::RoutingExhausted {
                reference: request.idempotency_key.clone(),
                message: NO_CONNECTORS_MESSAGE.to_string(),
                attempted: 0,
            });
        }

        for connector in &candidates {
            debug!("Trying {} for {}", connector.name(), request.idempotency_key);
            match connector.initiate_payment(request).await {
                Ok(response) if response.is_success() => {
                    ROUTER_ATTEMPTS_TOTAL
                        .with_label_values(&[connector.name(), "accepted"])
                        .inc();
                    info!(
                        "Payment {} routed via {} ({})",
                        request.idempotency_key,
                        connector.name(),
                        response.status
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    ROUTER_ATTEMPTS_TOTAL
                        .with_label_values(&[connector.name(), "failed"])
                        .inc();
                    info!(
                        "{} declined {}: {}",
                        connector.name(),
                        request.idempotency_key,
                        response.message.as_deref().unwrap_or("no reason given")
                    );
                }
                Err(e) => {
                    ROUTER_ATTEMPTS_TOTAL
                        .with_label_values(&[connector.name(), "error"])
                        .inc();
                    warn!(
                        "{} errored for {}, trying next rail: {}",
                        connector.name(),
                        request.idempotency_key,
                        e
                    );
                }
            }
        }

        Err(Error::RoutingExhausted {
            reference: request.idempotency_key.clone(),
            message: ALL_CONNECTORS_FAILED_MESSAGE.to_string(),
            attempted: candidates.len(),
        })
    }

    /// Poll a payment through the connector that issued `reference`
    pub async fn payment_status(&self, reference: &str) -> Result<PaymentState> {
        self.owner_of(reference)?.get_payment_status(reference).await
    }

    /// Refund a payment through the connector that issued `reference`
    pub async fn refund(&self, reference: &str, amount: Option<Decimal>) -> Result<RefundResponse> {
        self.owner_of(reference)?.refund(reference, amount).await
    }

    fn owner_of(&self, reference: &str) -> Result<&Arc<dyn RailConnector>> {
        self.connectors
            .iter()
            .find(|c| c.owns_reference(reference))
            .ok_or_else(|| Error::unknown_reference(reference))
    }

    fn record(&self, request: &PaymentRequest, response: &PaymentResponse) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let payload = TransactionRecorded {
            reference: response.reference.clone(),
            provider: response.provider.clone(),
            idempotency_key: request.idempotency_key.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            corridor: request.corridor.clone(),
            status: response.status,
        };

        match Event::from_payload(EventType::TransactionRecorded, &payload) {
            Ok(event) => notifier.notify(event.with_correlation_id(&request.idempotency_key)),
            Err(e) => warn!("Could not encode transaction notification: {}", e),
        }
    }
}

//! Rail connector interface

use crate::{types::*, Error, Result};
use async_trait::async_trait;
use protocol_core::{PaymentRequest, PaymentResponse, PaymentState, RefundResponse};
use rust_decimal::Decimal;

/// A settlement rail
///
/// `initiate_payment` reports business rejections (unsupported currency,
/// missing beneficiary, rail refusal) as a `failed` response and keeps
/// `Err` for transport-level faults, which the router treats as "try the
/// next rail".
#[async_trait]
pub trait RailConnector: Send + Sync {
    /// Provider name, unique within a router
    fn name(&self) -> &str;

    /// Prefix of the references this connector issues
    fn reference_prefix(&self) -> &str;

    /// Immutable capabilities
    fn capabilities(&self) -> &RailCapabilities;

    /// Sandbox or remote
    fn mode(&self) -> ConnectorMode;

    /// Start a payment
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse>;

    /// Poll a payment this connector issued
    async fn get_payment_status(&self, reference: &str) -> Result<PaymentState>;

    /// Refund a payment (full refund when `amount` is `None`)
    async fn refund(&self, reference: &str, amount: Option<Decimal>) -> Result<RefundResponse> {
        let _ = (reference, amount);
        Err(Error::RefundNotSupported(self.name().to_string()))
    }

    /// Reference for a request on this rail
    fn reference_for(&self, request: &PaymentRequest) -> String {
        format!("{}-{}", self.reference_prefix(), request.idempotency_key)
    }

    /// Whether `reference` was issued by this connector
    fn owns_reference(&self, reference: &str) -> bool {
        reference
            .strip_prefix(self.reference_prefix())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Operator view
    fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            name: self.name().to_string(),
            reference_prefix: self.reference_prefix().to_string(),
            mode: self.mode(),
            capabilities: self.capabilities().clone(),
        }
    }
}

//! Mobile money connector (M-Pesa style wallet rails)
//!
//! Domestic and East African corridors; payments settle asynchronously so
//! the rail is never offered for instant routing.

use crate::{backend::RailBackend, connector::RailConnector, types::*, Error, Result};
use async_trait::async_trait;
use protocol_core::{Corridor, PaymentRequest, PaymentResponse, PaymentState};
use resilience::ServiceClient;
use std::sync::Arc;
use tracing::info;

/// Provider name
pub const MOBILE_MONEY_PROVIDER: &str = "mobile-money";

/// Reference prefix
pub const MOBILE_MONEY_REFERENCE_PREFIX: &str = "MOMO";

const CURRENCIES: [&str; 5] = ["NGN", "GHS", "KES", "TZS", "UGX"];

const CORRIDORS: [(&str, &str); 7] = [
    ("NG", "NG"),
    ("GH", "GH"),
    ("KE", "KE"),
    ("TZ", "TZ"),
    ("UG", "UG"),
    ("KE", "UG"),
    ("KE", "TZ"),
];

/// Mobile money connector
#[derive(Debug)]
pub struct MobileMoneyConnector {
    capabilities: RailCapabilities,
    backend: RailBackend,
}

impl MobileMoneyConnector {
    /// Create a connector on the given backend
    pub fn new(backend: RailBackend) -> Self {
        Self {
            capabilities: RailCapabilities {
                currencies: CURRENCIES.iter().map(|c| c.to_string()).collect(),
                corridors: CORRIDORS
                    .iter()
                    .map(|(origin, destination)| Corridor::new(*origin, *destination))
                    .collect(),
                supports_instant: false,
            },
            backend,
        }
    }

    /// Local connector with no downstream
    pub fn sandbox() -> Self {
        Self::new(RailBackend::Sandbox)
    }

    /// Connector calling a remote wallet operator
    pub fn remote(client: Arc<ServiceClient>) -> Self {
        Self::new(RailBackend::Remote(client))
    }
}

#[async_trait]
impl RailConnector for MobileMoneyConnector {
    fn name(&self) -> &str {
        MOBILE_MONEY_PROVIDER
    }

    fn reference_prefix(&self) -> &str {
        MOBILE_MONEY_REFERENCE_PREFIX
    }

    fn capabilities(&self) -> &RailCapabilities {
        &self.capabilities
    }

    fn mode(&self) -> ConnectorMode {
        self.backend.mode()
    }

    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse> {
        let reference = self.reference_for(request);

        let rejection = if let Err(e) = request.ensure_valid() {
            Some(e.to_string())
        } else if !self.capabilities.supports_currency(&request.currency) {
            Some("Unsupported currency".to_string())
        } else if request.credited_account().is_none() {
            Some("Missing beneficiary".to_string())
        } else {
            None
        };

        if let Some(reason) = rejection {
            info!("Mobile money rejected {}: {}", request.idempotency_key, reason);
            return Ok(
                PaymentResponse::failed(reference, reason).with_provider(MOBILE_MONEY_PROVIDER)
            );
        }

        match self
            .backend
            .submit(MOBILE_MONEY_PROVIDER, reference.clone(), request)
            .await?
        {
            Some(response) => Ok(response),
            None => Ok(PaymentResponse::accepted(reference, MOBILE_MONEY_PROVIDER)),
        }
    }

    async fn get_payment_status(&self, reference: &str) -> Result<PaymentState> {
        if !self.owns_reference(reference) {
            return Err(Error::unknown_reference(reference));
        }
        Ok(self
            .backend
            .status(MOBILE_MONEY_PROVIDER, reference)
            .await?
            .unwrap_or(PaymentState::Processing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_core::Beneficiary;
    use resilience::{RetryConfig, ServiceClientConfig};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn kes(key: &str) -> PaymentRequest {
        PaymentRequest::new(dec!(1500), "KES")
            .with_idempotency_key(key)
            .with_beneficiary(Beneficiary {
                name: "Achieng".to_string(),
                account: "254712345678".to_string(),
                bank_code: None,
                country: Some("KE".to_string()),
            })
    }

    #[tokio::test]
    async fn test_sandbox_accepts_wallet_payment() {
        let connector = MobileMoneyConnector::sandbox();
        let resp = connector.initiate_payment(&kes("k-1")).await.unwrap();

        assert_eq!(resp.status, PaymentState::Accepted);
        assert_eq!(resp.reference, "MOMO-k-1");
        assert!(!connector.capabilities().supports_instant);
    }

    #[tokio::test]
    async fn test_missing_beneficiary_is_failed() {
        let connector = MobileMoneyConnector::sandbox();
        let resp = connector
            .initiate_payment(&PaymentRequest::new(dec!(100), "NGN"))
            .await
            .unwrap();

        assert_eq!(resp.status, PaymentState::Failed);
        assert_eq!(resp.message.as_deref(), Some("Missing beneficiary"));
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_failed() {
        let connector = MobileMoneyConnector::sandbox();
        let resp = connector
            .initiate_payment(&PaymentRequest::new(dec!(100), "EUR").with_destination_account("x"))
            .await
            .unwrap();

        assert_eq!(resp.message.as_deref(), Some("Unsupported currency"));
    }

    #[tokio::test]
    async fn test_refund_not_supported() {
        let connector = MobileMoneyConnector::sandbox();
        let err = connector.refund("MOMO-k-1", None).await.unwrap_err();
        assert!(matches!(err, Error::RefundNotSupported(ref name) if name == MOBILE_MONEY_PROVIDER));
        assert_eq!(
            connector.get_payment_status("MOMO-k-1").await.unwrap(),
            PaymentState::Processing
        );
    }

    #[tokio::test]
    async fn test_remote_unknown_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/MOMO-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ServiceClient::new(ServiceClientConfig {
            retry: RetryConfig::none(),
            ..ServiceClientConfig::new("momo-operator", server.uri())
        })
        .unwrap();
        let connector = MobileMoneyConnector::remote(Arc::new(client));

        let err = connector.get_payment_status("MOMO-gone").await.unwrap_err();
        assert!(err.is_validation());
    }
}

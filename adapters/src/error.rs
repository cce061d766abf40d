//! Error types for adapters

use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter errors
#[derive(Error, Debug)]
pub enum Error {
    /// Downstream rail call failed (transport, timeout, open circuit, 5xx)
    #[error(transparent)]
    Downstream(#[from] resilience::Error),

    /// Every candidate connector errored or failed
    #[error("{message} (reference {reference}, {attempted} attempted)")]
    RoutingExhausted {
        /// Idempotency key of the request
        reference: String,
        /// Outcome message
        message: String,
        /// Connectors tried
        attempted: usize,
    },

    /// Invalid input (amount, currency, unknown reference)
    #[error(transparent)]
    Validation(#[from] protocol_core::Error),

    /// Connector does not offer refunds
    #[error("Refund not supported by {0}")]
    RefundNotSupported(String),

    /// Rail answered with something we cannot interpret
    #[error("Unexpected response from {provider}: {message}")]
    UnexpectedResponse {
        /// Connector name
        provider: String,
        /// Detail
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Caller error rather than a rail fault
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::RefundNotSupported(_))
    }

    /// Unknown payment reference
    pub fn unknown_reference(reference: &str) -> Self {
        Error::Validation(protocol_core::Error::Validation(format!(
            "Unknown payment reference: {}",
            reference
        )))
    }
}

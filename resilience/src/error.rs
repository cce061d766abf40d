//! Error types for downstream calls

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for service client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Downstream call errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Dependency isolated by its circuit breaker; back off
    #[error("Circuit open for service {service}, next attempt at {retry_at}")]
    CircuitOpen {
        /// Service name
        service: String,
        /// Earliest time a trial call is allowed
        retry_at: DateTime<Utc>,
    },

    /// Dependency too slow
    #[error("Call to service {service} timed out after {timeout_ms}ms")]
    CallTimeout {
        /// Service name
        service: String,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// Network-level failure (connect, reset, TLS)
    #[error("Transport error calling {service}: {message}")]
    Transport {
        /// Service name
        service: String,
        /// Error message (URL stripped)
        message: String,
    },

    /// Non-success HTTP status
    #[error("Service {service} responded with HTTP {status}: {body}")]
    Status {
        /// Service name
        service: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response body could not be decoded
    #[error("Could not decode response from {service}: {message}")]
    Decode {
        /// Service name
        service: String,
        /// Decoder message
        message: String,
    },

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Service not present in the registry
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Network errors, attempt timeouts and 5xx responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::CallTimeout { .. } => true,
            Error::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// 4xx: the dependency is healthy, the request was not
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Status { status, .. } if (400..500).contains(status))
    }

    /// Whether this error should count against the dependency's breaker
    pub fn counts_against_breaker(&self) -> bool {
        !self.is_client_error()
            && !matches!(self, Error::InvalidRequest(_) | Error::UnknownService(_))
    }
}

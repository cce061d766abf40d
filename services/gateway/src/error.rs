//! Gateway errors and their HTTP mapping
//!
//! Caller errors carry their message. Downstream and internal failures are
//! logged in full and answered with a generic message, so responses never
//! expose downstream URLs or error chains.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;

/// Startup errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Event bus unavailable
    #[error(transparent)]
    Bus(#[from] message_bus::Error),

    /// Downstream client could not be built
    #[error(transparent)]
    Resilience(#[from] resilience::Error),

    /// Connector registration failed
    #[error(transparent)]
    Adapters(#[from] adapters::Error),
}

/// Errors returned by handlers
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (400)
    Validation(String),
    /// Rail or node unavailable (502)
    Downstream(String),
    /// Anchoring failed (500)
    Anchoring(String),
    /// Anything else (500)
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Downstream(detail) => {
                error!("Downstream failure: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    "Downstream service unavailable".to_string(),
                )
            }
            ApiError::Anchoring(detail) => {
                error!("Anchoring failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Anchoring failed".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<protocol_core::Error> for ApiError {
    fn from(err: protocol_core::Error) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<adapters::Error> for ApiError {
    fn from(err: adapters::Error) -> Self {
        if err.is_validation() {
            return ApiError::Validation(err.to_string());
        }
        match err {
            adapters::Error::Downstream(e) => ApiError::Downstream(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ledger_core::Error> for ApiError {
    fn from(err: ledger_core::Error) -> Self {
        match err {
            ledger_core::Error::InvalidRootHash(_) | ledger_core::Error::InvalidHash(_) => {
                ApiError::Validation(err.to_string())
            }
            ledger_core::Error::AnchorSubmissionFailed { .. } => ApiError::Anchoring(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<reconciliation::Error> for ApiError {
    fn from(err: reconciliation::Error) -> Self {
        ApiError::Validation(err.into_validation().to_string())
    }
}

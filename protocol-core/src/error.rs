//! Error types for protocol operations

use thiserror::Error;

/// Protocol result type
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed request (never retried)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Corridor string could not be parsed
    #[error("Invalid corridor '{0}': expected ORIGIN->DESTINATION")]
    InvalidCorridor(String),
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

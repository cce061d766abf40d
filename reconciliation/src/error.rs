//! Reconciliation errors

use thiserror::Error;

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum Error {
    /// An input line failed validation
    #[error("Invalid {side} entry at index {index}: {message}")]
    InvalidEntry {
        /// "statement" or "ledger"
        side: &'static str,
        /// Position in the submitted list
        index: usize,
        /// Validation detail
        message: String,
    },
}

impl Error {
    /// Convert into the shared validation error
    pub fn into_validation(self) -> protocol_core::Error {
        protocol_core::Error::Validation(self.to_string())
    }
}

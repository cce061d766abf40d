//! Error types for the ledger integrity engine

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Recomputed chain does not match what the entries declare
    #[error("Chain integrity violation: {count} violation(s), first at entry {first_index}")]
    ChainIntegrityViolation {
        /// Number of violations
        count: usize,
        /// Index of the first violating entry
        first_index: usize,
    },

    /// External ledger did not confirm the root
    #[error("Anchor submission failed for root {root_hash}: {reason}")]
    AnchorSubmissionFailed {
        /// Root being anchored
        root_hash: String,
        /// Failure detail
        reason: String,
    },

    /// Root hash is not 64 hex characters
    #[error("Invalid root hash: {0}")]
    InvalidRootHash(String),

    /// Hex digest could not be decoded
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// JSON-RPC node returned an error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// HTTP call to the node failed
    #[error(transparent)]
    Downstream(#[from] resilience::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Ledger Integrity Engine
//!
//! Proves that recorded transactions were not altered after the fact.
//!
//! # Architecture
//!
//! - **Hash chain**: every entry hashes its declared predecessor hash and
//!   its canonical JSON data; verification recomputes the whole chain
//! - **Merkle tree**: one root summarises the computed entry hashes, with
//!   inclusion proofs
//! - **Anchoring**: roots are committed to an external EVM ledger, either on
//!   demand or by a background scheduler, one submission at a time
//!
//! # Invariants
//!
//! - Verification is a pure function of its input
//! - Only roots of valid chains become anchoring candidates
//! - At most one anchor submission is in flight per process

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod anchor;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod metrics;
pub mod rpc;
pub mod scheduler;
pub mod types;

// Re-exports
pub use anchor::{AnchorLedger, AnchorService, LocalAnchorLedger};
pub use chain::{canonicalize, verify_chain, ChainVerification, ChainViolation, ViolationKind};
pub use config::AnchorConfig;
pub use error::{Error, Result};
pub use merkle::{merkle_root_hex, MerkleProof, MerkleTree};
pub use rpc::JsonRpcAnchorClient;
pub use scheduler::AnchorScheduler;
pub use types::{
    AnchorHealth, AnchorReceipt, AnchorRecord, AnchorRun, AnchorStatus, LastSuccessfulAnchor,
    LedgerEntry, RunOutcome,
};

/// Anchoring method recorded on every anchor
pub const ANCHOR_METHOD: &str = "evm-calldata";

//! Statement reconciliation
//!
//! Matches rail statement lines against ledger records by reference, the
//! connector-prefixed string the payment router hands back (`SEPA-...`,
//! `MOMO-...`).
//!
//! # Rules
//!
//! - A statement line with no ledger record of the same reference is
//!   `"Missing in ledger"`
//! - A statement line whose ledger record differs in amount or currency is
//!   `"Amount or currency mismatch"`
//! - Ledger records never referenced by the statement are listed separately
//!   and do not count as mismatches

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod types;

pub use error::{Error, Result};
pub use reconcile::reconcile;
pub use types::*;

/// Reason for a statement line with no ledger record
pub const MISSING_IN_LEDGER: &str = "Missing in ledger";

/// Reason for a statement line that disagrees with its ledger record
pub const AMOUNT_OR_CURRENCY_MISMATCH: &str = "Amount or currency mismatch";

//! Reconciliation inputs and report

use protocol_core::validation::validate_currency_code;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One statement line or ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReconciliationEntry {
    /// Rail reference
    #[validate(length(min = 1, max = 128))]
    pub reference: String,

    /// Amount
    pub amount: Decimal,

    /// ISO 4217 currency code
    #[validate(custom(function = "validate_currency_code"))]
    pub currency: String,
}

impl ReconciliationEntry {
    /// Create an entry
    pub fn new(reference: impl Into<String>, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            amount,
            currency: currency.into(),
        }
    }

    /// Same amount and currency
    pub fn agrees_with(&self, other: &ReconciliationEntry) -> bool {
        self.amount == other.amount && self.currency == other.currency
    }
}

/// Classification of a statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Ledger record found and agrees
    Matched,
    /// Missing or disagreeing ledger record
    Mismatched,
}

/// Result for one statement line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationItem {
    /// Reference
    pub reference: String,
    /// Status
    pub status: MatchStatus,
    /// Why the line did not match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Statement line
    pub statement: ReconciliationEntry,
    /// Ledger record with the same reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<ReconciliationEntry>,
}

/// Counts over the statement lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    /// Statement lines
    pub total: usize,
    /// Matched lines
    pub matched: usize,
    /// Mismatched lines
    pub mismatched: usize,
}

/// Full reconciliation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// One item per statement line, in statement order
    pub items: Vec<ReconciliationItem>,
    /// Counts
    pub summary: ReconciliationSummary,
    /// Ledger records no statement line referenced
    pub unmatched_ledger: Vec<ReconciliationEntry>,
}

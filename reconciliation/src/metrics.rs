//! Reconciliation metrics

use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static::lazy_static! {
    /// Reconciled statement lines by status (matched, mismatched)
    pub static ref RECONCILED_ITEMS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reconciliation_items_total",
        "Statement lines reconciled against the ledger",
        &["status"]
    )
    .unwrap();
}

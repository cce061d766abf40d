//! Prometheus metrics for verification and anchoring
//!
//! - `ledger_verifications_total{result}` - chain verifications
//! - `ledger_entries_verified_total` - entries hashed by verifications
//! - `ledger_anchor_submissions_total{status}` - anchor submissions
//! - `ledger_anchor_submit_duration_seconds` - submission latency
//! - `ledger_anchor_lag_seconds` - age of the last confirmed anchor block
//! - `ledger_anchor_runs_total{outcome}` - scheduled runs

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    /// Chain verifications by result (valid, invalid)
    pub static ref LEDGER_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_verifications_total",
        "Hash chain verifications",
        &["result"]
    )
    .unwrap();

    /// Entries hashed across all verifications
    pub static ref LEDGER_ENTRIES_VERIFIED_TOTAL: IntCounter = register_int_counter!(
        "ledger_entries_verified_total",
        "Ledger entries recomputed during verification"
    )
    .unwrap();

    /// Anchor submissions by status (success, failed)
    pub static ref ANCHOR_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_anchor_submissions_total",
        "Merkle root anchor submissions",
        &["status"]
    )
    .unwrap();

    /// Anchor submission latency
    pub static ref ANCHOR_SUBMIT_DURATION: Histogram = register_histogram!(
        "ledger_anchor_submit_duration_seconds",
        "Anchor submission latency including confirmation",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    /// Seconds since the last confirmed anchor block, -1 before the first
    pub static ref ANCHOR_LAG_SECONDS: IntGauge = register_int_gauge!(
        "ledger_anchor_lag_seconds",
        "Seconds since the block of the last successful anchor"
    )
    .unwrap();

    /// Scheduled runs by outcome (anchored, skipped, failed)
    pub static ref ANCHOR_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_anchor_runs_total",
        "Scheduled anchoring runs",
        &["outcome"]
    )
    .unwrap();
}

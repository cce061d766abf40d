//! Gateway metrics

use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static::lazy_static! {
    /// Payment submissions by outcome (accepted, failed, invalid)
    pub static ref PAYMENT_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gateway_payment_submissions_total",
        "Payment submissions received by the gateway",
        &["outcome"]
    )
    .unwrap();
}

/// Every registered metric in the Prometheus text format
pub fn export() -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

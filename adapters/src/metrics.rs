//! Adapter metrics

use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

lazy_static::lazy_static! {
    /// Connector attempts made by the router, by outcome
    pub static ref ROUTER_ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "router_connector_attempts_total",
        "Connector attempts made by the payment router",
        &["connector", "outcome"]
    )
    .unwrap();

    /// Routing decisions by result
    pub static ref ROUTING_DECISIONS_TOTAL: CounterVec = register_counter_vec!(
        "router_decisions_total",
        "Routing decisions (routed, no_candidates, exhausted)",
        &["result"]
    )
    .unwrap();

    /// Remote rail call duration
    pub static ref CONNECTOR_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "connector_request_duration_seconds",
        "Remote rail request duration",
        &["connector", "operation"]
    )
    .unwrap();
}

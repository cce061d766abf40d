//! Resilience metrics

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec, CounterVec, HistogramVec, IntCounterVec, IntGaugeVec,
};

lazy_static::lazy_static! {
    /// Current breaker state per dependency
    pub static ref CIRCUIT_BREAKER_STATE: IntGaugeVec = register_int_gauge_vec!(
        "circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=half-open, 2=open)",
        &["dependency"]
    )
    .unwrap();

    /// Times a breaker opened
    pub static ref CIRCUIT_BREAKER_TRIPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "circuit_breaker_trips_total",
        "Transitions into the open state",
        &["dependency"]
    )
    .unwrap();

    /// Calls short-circuited by an open breaker
    pub static ref CIRCUIT_BREAKER_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "circuit_breaker_rejections_total",
        "Calls rejected while the circuit was open",
        &["dependency"]
    )
    .unwrap();

    /// Logical calls by outcome
    pub static ref SERVICE_CLIENT_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "service_client_requests_total",
        "Logical downstream calls by outcome",
        &["service", "outcome"]
    )
    .unwrap();

    /// Logical call latency
    pub static ref SERVICE_CLIENT_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "service_client_request_duration_seconds",
        "Logical downstream call duration, retries included",
        &["service"]
    )
    .unwrap();

    /// Retry attempts
    pub static ref SERVICE_CLIENT_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "service_client_retries_total",
        "Retry attempts issued by service clients",
        &["service"]
    )
    .unwrap();
}

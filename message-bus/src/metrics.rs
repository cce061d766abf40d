//! Prometheus metrics for message bus

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec,
    HistogramVec, IntCounterVec,
};

lazy_static! {
    /// Total events published
    pub static ref EVENT_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "message_bus_publish_total",
        "Total events published",
        &["subject", "status"]
    )
    .unwrap();

    /// Event publish duration
    pub static ref EVENT_PUBLISH_DURATION: HistogramVec = register_histogram_vec!(
        "message_bus_publish_duration_seconds",
        "Event publish duration in seconds",
        &["subject"]
    )
    .unwrap();

    /// Notifications dropped because the queue was full or closed
    pub static ref NOTIFICATIONS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "message_bus_notifications_dropped_total",
        "Notifications dropped before reaching a publisher",
        &["subject"]
    )
    .unwrap();
}

//! Message Bus for payment and audit notifications
//!
//! Provides:
//! - Event envelope and the two notification subjects
//!   (`payments.transaction.recorded`, `ledger.audit.created`)
//! - `EventPublisher` trait with a NATS implementation (JetStream optional)
//!   and logging / in-memory implementations
//! - `Notifier`: fire-and-forget delivery through a bounded queue drained
//!   by a background task, so callers never wait on the bus
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod event;
pub mod metrics;
pub mod notifier;
pub mod publisher;
pub mod types;

pub use error::{Error, Result};
pub use event::Event;
pub use notifier::Notifier;
pub use publisher::{EventPublisher, LogPublisher, MemoryPublisher, NatsPublisher, PublisherConfig};
pub use types::EventType;

/// Default capacity of the notification queue
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 1_024;

//! # Resilience
//!
//! Protection for calls between services:
//! - Circuit breaker per named dependency (Closed / Open / HalfOpen)
//! - Bounded retry with exponential backoff and jitter
//! - HTTP service client running each retried call through its breaker
//! - Registry of named dependencies built at startup
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ServiceClient                   │
//! │  breaker.execute(                            │
//! │      retry.run( attempt -> HTTP request )    │
//! │  )                                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The breaker sees one outcome per logical call, so a transient failure
//! absorbed by a retry never counts towards opening the circuit.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{
    BreakerError, BreakerSnapshot, BreakerTransition, CircuitBreaker, CircuitBreakerConfig,
    CircuitState,
};
pub use client::{ServiceClient, ServiceClientConfig};
pub use error::{Error, Result};
pub use registry::ServiceRegistry;
pub use retry::{RetryConfig, RetryPolicy};

/// Default failures before the circuit opens
pub const DEFAULT_CB_FAILURE_THRESHOLD: u32 = 5;

/// Default successes in half-open before the circuit closes
pub const DEFAULT_CB_SUCCESS_THRESHOLD: u32 = 2;

/// Default time the circuit stays open (milliseconds)
pub const DEFAULT_CB_RESET_TIMEOUT_MS: u64 = 30_000;

/// Default time budget for one breaker-guarded call (milliseconds)
pub const DEFAULT_CB_CALL_TIMEOUT_MS: u64 = 10_000;

/// Default per-attempt HTTP timeout (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;

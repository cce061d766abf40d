//! # Rail Adapters
//!
//! Settlement rail connectivity and payment routing:
//! - `RailConnector` abstraction every rail satisfies
//! - SEPA Instant and Mobile Money connectors (sandbox or remote mode)
//! - `PaymentRouter` choosing a rail by currency, corridor, speed and
//!   caller preference, falling back across candidates
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Payment Router (filter, order, fallback)     │
//! └────────────┬───────────────────────┬────────────────┘
//!              │                       │
//!      ┌───────▼────────┐      ┌───────▼────────┐
//!      │  SEPA Instant  │      │  Mobile Money  │
//!      │   Connector    │      │   Connector    │
//!      └───────┬────────┘      └───────┬────────┘
//!              │                       │
//! ┌────────────▼───────────────────────▼─────────────┐
//! │     ServiceClient (retry) + Circuit Breaker      │
//! └──────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod backend;
pub mod connector;
pub mod error;
pub mod metrics;
pub mod mobile_money;
pub mod router;
pub mod sepa;
pub mod types;

pub use backend::RailBackend;
pub use connector::RailConnector;
pub use error::{Error, Result};
pub use mobile_money::MobileMoneyConnector;
pub use router::PaymentRouter;
pub use sepa::SepaInstantConnector;
pub use types::*;

/// Message when no connector matches the request
pub const NO_CONNECTORS_MESSAGE: &str = "No available connectors for request";

/// Message when every candidate failed
pub const ALL_CONNECTORS_FAILED_MESSAGE: &str = "All connectors failed";

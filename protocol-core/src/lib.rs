//! # Payment Protocol Core
//!
//! Shared vocabulary for the payment core:
//! - Payment requests and responses exchanged with rail connectors
//! - Corridors (origin -> destination country pairs)
//! - Request validation (amount, currency, corridor)
//! - An injectable clock so time-dependent components stay testable
//!
//! Every other crate in the workspace depends on these types; nothing here
//! performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod clock;
pub mod error;
pub mod types;
pub mod validation;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{Error, Result};
pub use types::*;

/// Length of an ISO 4217 currency code
pub const CURRENCY_CODE_LEN: usize = 3;

/// Separator between origin and destination in a corridor string
pub const CORRIDOR_SEPARATOR: &str = "->";

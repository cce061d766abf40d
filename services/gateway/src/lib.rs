//! Payments gateway
//!
//! HTTP surface over the payment router, the ledger integrity engine and
//! reconciliation. Every component is built once in [`bootstrap::build`]
//! and shared through [`AppState`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;

use adapters::PaymentRouter;
use axum::{
    routing::{get, post},
    Router,
};
use ledger_core::AnchorService;
use resilience::ServiceRegistry;
use std::fmt;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Rail routing
    pub router: Arc<PaymentRouter>,
    /// Chain verification and anchoring
    pub anchor: Arc<AnchorService>,
    /// Downstream clients and their breakers
    pub registry: Arc<ServiceRegistry>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("connectors", &self.router.connectors().len())
            .field("services", &self.registry.names())
            .finish()
    }
}

/// HTTP routes
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/payments", post(handlers::submit_payment))
        .route("/payments/:reference/status", get(handlers::payment_status))
        .route("/payments/:reference/refund", post(handlers::refund_payment))
        .route("/connectors", get(handlers::list_connectors))
        .route("/ledger/verify", post(handlers::verify_ledger))
        .route("/ledger/anchor", post(handlers::anchor_root))
        .route("/ledger/anchors", get(handlers::list_anchors))
        .route("/reconciliation", post(handlers::reconcile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

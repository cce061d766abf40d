//! HTTP handlers

use crate::error::ApiError;
use crate::metrics::{self, PAYMENT_SUBMISSIONS_TOTAL};
use crate::AppState;
use adapters::{ConnectorInfo, RoutePolicy};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use ledger_core::{AnchorRecord, AnchorRun, ChainVerification, LastSuccessfulAnchor, LedgerEntry};
use protocol_core::{PaymentRequest, PaymentResponse, PaymentState, RefundResponse};
use reconciliation::{ReconciliationEntry, ReconciliationReport};
use resilience::{BreakerSnapshot, CircuitState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default and maximum number of anchor records listed
const DEFAULT_ANCHOR_LIST_LIMIT: usize = 20;
const MAX_ANCHOR_LIST_LIMIT: usize = 100;

// =========================================================================
// HEALTH & METRICS
// =========================================================================

/// `GET /health` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` while any breaker is open
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
    /// Service version
    pub version: &'static str,
    /// Root waiting to be anchored
    pub latest_merkle_root: Option<String>,
    /// Last scheduled anchoring run
    pub last_anchor_run: Option<AnchorRun>,
    /// Last confirmed anchor
    pub last_successful_anchor: Option<LastSuccessfulAnchor>,
    /// Seconds since the last confirmed anchor block, -1 when never anchored
    pub anchor_lag: i64,
    /// Downstream breakers
    pub breakers: Vec<BreakerSnapshot>,
}

/// Health check
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let anchor = state.anchor.health();
    let breakers = state.registry.breaker_snapshots();
    let degraded = breakers.iter().any(|b| b.state == CircuitState::Open);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        service: "payments-gateway",
        version: env!("CARGO_PKG_VERSION"),
        latest_merkle_root: anchor.latest_merkle_root,
        last_anchor_run: anchor.last_anchor_run,
        last_successful_anchor: anchor.last_successful_anchor,
        anchor_lag: anchor.anchor_lag,
        breakers,
    })
}

/// Prometheus metrics
pub async fn metrics() -> Result<String, ApiError> {
    metrics::export().map_err(|e| ApiError::Internal(format!("Failed to export metrics: {}", e)))
}

// =========================================================================
// PAYMENTS
// =========================================================================

/// `POST /payments` body
#[derive(Debug, Deserialize)]
pub struct SubmitPayment {
    /// Payment
    #[serde(flatten)]
    pub payment: PaymentRequest,
    /// Routing preferences
    #[serde(default)]
    pub policy: RoutePolicy,
}

/// Route a payment; 200 unless the outcome is `failed`
pub async fn submit_payment(
    State(state): State<AppState>,
    body: Result<Json<SubmitPayment>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let Json(SubmitPayment { payment, mut policy }) = body.map_err(|e| {
        PAYMENT_SUBMISSIONS_TOTAL.with_label_values(&["invalid"]).inc();
        ApiError::from(e)
    })?;

    if let Err(e) = payment.ensure_valid() {
        PAYMENT_SUBMISSIONS_TOTAL.with_label_values(&["invalid"]).inc();
        return Err(e.into());
    }

    // The request's own corridor applies unless the policy names one
    if policy.corridor.is_none() {
        policy.corridor = payment.corridor.clone();
    }

    info!(
        "Routing payment {} ({} {})",
        payment.idempotency_key, payment.amount, payment.currency
    );
    let response = state.router.route(&payment, &policy).await;

    let (status, outcome) = if response.is_success() {
        (StatusCode::OK, "accepted")
    } else {
        (StatusCode::BAD_REQUEST, "failed")
    };
    PAYMENT_SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();

    Ok((status, Json(response)))
}

/// `GET /payments/:reference/status` body
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    /// Rail reference
    pub reference: String,
    /// Current state
    pub status: PaymentState,
}

/// Poll a payment through its connector
pub async fn payment_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let status = state.router.payment_status(&reference).await?;
    Ok(Json(PaymentStatusResponse { reference, status }))
}

/// `POST /payments/:reference/refund` body
#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Partial refund amount; full refund when absent
    #[serde(default)]
    pub amount: Option<Decimal>,
}

impl RefundRequest {
    /// An empty body is a full refund; anything else must be a valid request
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("Invalid refund request: {}", e)))
    }
}

/// Refund a payment through its connector
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    body: Bytes,
) -> Result<Json<RefundResponse>, ApiError> {
    let request = RefundRequest::from_body(&body)?;
    let refund = state.router.refund(&reference, request.amount).await?;
    Ok(Json(refund))
}

/// Registered connectors
pub async fn list_connectors(State(state): State<AppState>) -> Json<Vec<ConnectorInfo>> {
    Json(state.router.connectors())
}

// =========================================================================
// LEDGER
// =========================================================================

/// `POST /ledger/verify` body
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Chain to verify
    #[serde(default)]
    pub entries: Option<Vec<LedgerEntry>>,
}

/// Verify a hash chain
pub async fn verify_ledger(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<ChainVerification>, ApiError> {
    let Json(request) = body?;
    let entries = request
        .entries
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("entries must be a non-empty array".to_string()))?;

    Ok(Json(state.anchor.verify(&entries)))
}

/// `POST /ledger/anchor` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRequest {
    /// Merkle root (64 hex characters)
    pub root_hash: String,
}

/// Anchor a root now
pub async fn anchor_root(
    State(state): State<AppState>,
    body: Result<Json<AnchorRequest>, JsonRejection>,
) -> Result<Json<AnchorRecord>, ApiError> {
    let Json(request) = body?;
    let record = state.anchor.anchor_root(&request.root_hash).await?;
    Ok(Json(record))
}

/// `GET /ledger/anchors` query
#[derive(Debug, Deserialize)]
pub struct AnchorListQuery {
    /// Records to return
    pub limit: Option<usize>,
}

/// Recent anchor records, newest first
pub async fn list_anchors(
    State(state): State<AppState>,
    Query(query): Query<AnchorListQuery>,
) -> Json<Vec<AnchorRecord>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ANCHOR_LIST_LIMIT)
        .min(MAX_ANCHOR_LIST_LIMIT);
    Json(state.anchor.history(limit))
}

// =========================================================================
// RECONCILIATION
// =========================================================================

/// `POST /reconciliation` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    /// Rail statement lines
    pub statement_entries: Vec<ReconciliationEntry>,
    /// Ledger records
    pub ledger_entries: Vec<ReconciliationEntry>,
}

/// Reconcile a statement against ledger records
pub async fn reconcile(
    body: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let Json(request) = body?;
    let report = reconciliation::reconcile(&request.statement_entries, &request.ledger_entries)?;
    Ok(Json(report))
}

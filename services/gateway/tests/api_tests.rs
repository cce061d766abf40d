// HTTP tests against the fully wired gateway

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use ledger_core::chain::entry_digest;
use payments_gateway::{app, bootstrap, config::Config};
use protocol_core::SystemClock;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn gateway() -> Router {
    let services = bootstrap::build(&Config::default(), SystemClock::shared())
        .await
        .unwrap();
    app(services.state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Correctly linked ledger entries over `data`
fn chain(data: &[Value]) -> Vec<Value> {
    let mut prev = String::new();
    data.iter()
        .enumerate()
        .map(|(i, d)| {
            let hash = hex::encode(entry_digest(&prev, d));
            let entry = json!({"id": i + 1, "prevHash": prev, "data": d, "hash": hash});
            prev = hash;
            entry
        })
        .collect()
}

#[tokio::test]
async fn test_sepa_payment_is_accepted() {
    let app = gateway().await;
    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({
            "idempotencyKey": "inv-2024-001",
            "amount": 100.50,
            "currency": "EUR",
            "beneficiary": {"name": "Ada", "account": "DE89370400440532013000"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["reference"], "SEPA-inv-2024-001");
    assert_eq!(body["provider"], "sepa-instant");
}

#[tokio::test]
async fn test_mobile_money_payment_is_accepted() {
    let app = gateway().await;
    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({
            "idempotencyKey": "momo-1",
            "amount": 2500,
            "currency": "KES",
            "destinationAccount": "+254712345678"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "mobile-money");
}

#[tokio::test]
async fn test_unsupported_currency_has_no_connector() {
    let app = gateway().await;
    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({"idempotencyKey": "jpy-1", "amount": 10, "currency": "JPY"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["reference"], "jpy-1");
    assert_eq!(body["message"], "No available connectors for request");
}

#[tokio::test]
async fn test_invalid_payment_is_rejected() {
    let app = gateway().await;
    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({"amount": -5, "currency": "EUR"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_status_and_refund_follow_reference() {
    let app = gateway().await;
    send(
        &app,
        "POST",
        "/payments",
        Some(json!({"idempotencyKey": "k-7", "amount": 12, "currency": "EUR"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/payments/SEPA-k-7/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"], "SEPA-k-7");
    assert_eq!(body["status"], "completed");

    let (status, body) = send(
        &app,
        "POST",
        "/payments/SEPA-k-7/refund",
        Some(json!({"amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refundReference"], "SEPA-k-7-RF");
}

#[tokio::test]
async fn test_malformed_refund_amount_is_rejected() {
    let app = gateway().await;
    send(
        &app,
        "POST",
        "/payments",
        Some(json!({"idempotencyKey": "k-9", "amount": 40, "currency": "EUR"})),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/payments/SEPA-k-9/refund",
        Some(json!({"amount": "five"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Invalid refund request"));
}

#[tokio::test]
async fn test_empty_refund_body_is_full_refund() {
    let app = gateway().await;
    send(
        &app,
        "POST",
        "/payments",
        Some(json!({"idempotencyKey": "k-10", "amount": 40, "currency": "EUR"})),
    )
    .await;

    let (status, body) = send(&app, "POST", "/payments/SEPA-k-10/refund", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refundReference"], "SEPA-k-10-RF");
    assert!(body["amount"].is_null());
}

#[tokio::test]
async fn test_unknown_reference_is_bad_request() {
    let app = gateway().await;
    let (status, body) = send(&app, "GET", "/payments/WIRE-123/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Unknown payment reference"));
}

#[tokio::test]
async fn test_connectors_are_listed() {
    let app = gateway().await;
    let (status, body) = send(&app, "GET", "/connectors", None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["sepa-instant", "mobile-money"]);
    assert_eq!(body[0]["mode"], "sandbox");
}

#[tokio::test]
async fn test_verify_valid_chain() {
    let app = gateway().await;
    let entries = chain(&[json!({"amount": 100}), json!({"amount": 200})]);
    let (status, body) = send(&app, "POST", "/ledger/verify", Some(json!({"entries": entries}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validChain"], true);
    assert_eq!(body["merkleRoot"].as_str().unwrap().len(), 64);
    assert_eq!(body["lastHash"], entries[1]["hash"]);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["latestMerkleRoot"], body["merkleRoot"]);
}

#[tokio::test]
async fn test_verify_tampered_chain() {
    let app = gateway().await;
    let mut entries = chain(&[json!({"amount": 100}), json!({"amount": 200})]);
    entries[1]["data"] = json!({"amount": 999});

    let (status, body) = send(&app, "POST", "/ledger/verify", Some(json!({"entries": entries}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validChain"], false);
    assert_eq!(body["violations"][0]["index"], 1);
    assert_eq!(body["merkleRoot"].as_str().unwrap().len(), 64);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert!(health["latestMerkleRoot"].is_null());
}

#[tokio::test]
async fn test_verify_requires_entries() {
    let app = gateway().await;
    let (status, _) = send(&app, "POST", "/ledger/verify", Some(json!({"entries": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/ledger/verify", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anchor_rejects_malformed_root() {
    let app = gateway().await;
    let (status, body) = send(&app, "POST", "/ledger/anchor", Some(json!({"rootHash": "not-a-hash"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_anchor_root_and_history() {
    let app = gateway().await;
    let root = "ab".repeat(32);
    let (status, body) = send(&app, "POST", "/ledger/anchor", Some(json!({"rootHash": root}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["rootHash"], root);
    assert!(body["externalTxReference"].as_str().unwrap().starts_with("0x"));

    let (status, history) = send(&app, "GET", "/ledger/anchors?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["lastSuccessfulAnchor"]["rootHash"], root);
    assert!(health["anchorLag"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_health_before_any_anchor() {
    let app = gateway().await;
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "payments-gateway");
    assert_eq!(body["anchorLag"], -1);
    assert!(body["lastAnchorRun"].is_null());
    assert!(body["breakers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reconciliation_single_match() {
    let app = gateway().await;
    let (status, body) = send(
        &app,
        "POST",
        "/reconciliation",
        Some(json!({
            "statementEntries": [{"reference": "SEPA-1", "amount": 100.5, "currency": "EUR"}],
            "ledgerEntries": [{"reference": "SEPA-1", "amount": 100.5, "currency": "EUR"}]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], json!({"total": 1, "matched": 1, "mismatched": 0}));
    assert_eq!(body["items"][0]["status"], "matched");
}

#[tokio::test]
async fn test_reconciliation_rejects_bad_currency() {
    let app = gateway().await;
    let (status, _) = send(
        &app,
        "POST",
        "/reconciliation",
        Some(json!({
            "statementEntries": [{"reference": "SEPA-1", "amount": 1, "currency": "euro"}],
            "ledgerEntries": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_are_exported() {
    let app = gateway().await;
    send(
        &app,
        "POST",
        "/payments",
        Some(json!({"idempotencyKey": "m-1", "amount": 1, "currency": "EUR"})),
    )
    .await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("payment_submissions_total"));
}

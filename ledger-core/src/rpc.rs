//! EVM JSON-RPC anchoring
//!
//! The root travels as transaction calldata from a node-managed account
//! (`eth_sendTransaction`). The client then polls `eth_getTransactionReceipt`
//! until the transaction is mined and reads the block timestamp with
//! `eth_getBlockByNumber`. Every call goes through a resilience
//! `ServiceClient`, so node outages trip its breaker.

use crate::anchor::AnchorLedger;
use crate::config::AnchorConfig;
use crate::types::AnchorReceipt;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resilience::ServiceClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: String,
    block_number: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Block {
    timestamp: String,
}

/// Anchors roots on an EVM-compatible chain
#[derive(Debug)]
pub struct JsonRpcAnchorClient {
    client: Arc<ServiceClient>,
    config: AnchorConfig,
    next_id: AtomicU64,
}

impl JsonRpcAnchorClient {
    /// Client on an existing service client pointed at the node
    pub fn new(client: Arc<ServiceClient>, config: AnchorConfig) -> Self {
        Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse = self.client.post_json("/", &request).await?;
        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        match response.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| Error::Rpc {
                code: -32700,
                message: format!("unexpected {} result: {}", method, e),
            }),
        }
    }

    async fn send_transaction(&self, root_hash: &str) -> Result<String> {
        let params = json!([{
            "from": self.config.from_address,
            "to": self.config.to_address,
            "data": format!("0x{}", root_hash),
        }]);
        self.call("eth_sendTransaction", params)
            .await?
            .ok_or_else(|| Error::Rpc {
                code: -32603,
                message: "eth_sendTransaction returned no hash".to_string(),
            })
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        for attempt in 1..=self.config.receipt_poll_attempts.max(1) {
            let receipt: Option<TransactionReceipt> = self
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            debug!("Receipt for {} not available (poll {})", tx_hash, attempt);
            tokio::time::sleep(self.config.receipt_poll_interval()).await;
        }

        Err(Error::Rpc {
            code: -32000,
            message: format!(
                "transaction {} not mined after {} polls",
                tx_hash, self.config.receipt_poll_attempts
            ),
        })
    }

    async fn block_timestamp(&self, block_number: &str) -> Result<DateTime<Utc>> {
        let block: Block = self
            .call("eth_getBlockByNumber", json!([block_number, false]))
            .await?
            .ok_or_else(|| Error::Rpc {
                code: -32000,
                message: format!("block {} not found", block_number),
            })?;

        let seconds = parse_quantity(&block.timestamp)?;
        i64::try_from(seconds)
            .ok()
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .ok_or_else(|| Error::Rpc {
                code: -32700,
                message: format!("block timestamp out of range: {}", block.timestamp),
            })
    }
}

#[async_trait]
impl AnchorLedger for JsonRpcAnchorClient {
    async fn submit_root(&self, root_hash: &str) -> Result<AnchorReceipt> {
        let tx_hash = self.send_transaction(root_hash).await?;
        debug!("Submitted anchor transaction {}", tx_hash);

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.status.as_deref() == Some("0x0") {
            return Err(Error::AnchorSubmissionFailed {
                root_hash: root_hash.to_string(),
                reason: format!("transaction {} reverted", receipt.transaction_hash),
            });
        }

        let block_timestamp = self.block_timestamp(&receipt.block_number).await?;
        Ok(AnchorReceipt {
            tx_reference: receipt.transaction_hash,
            block_number: parse_quantity(&receipt.block_number)?,
            block_timestamp,
        })
    }

    fn name(&self) -> &str {
        self.client.name()
    }
}

/// Parse an EVM hex quantity such as `0x1b4`
fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|e| Error::Rpc {
        code: -32700,
        message: format!("invalid quantity {}: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience::{RetryConfig, ServiceClientConfig};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TX: &str = "0x9f1c00000000000000000000000000000000000000000000000000000000beef";

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
    }

    fn anchor_client(server: &MockServer) -> JsonRpcAnchorClient {
        let client = ServiceClient::new(ServiceClientConfig {
            retry: RetryConfig::none(),
            ..ServiceClientConfig::new("evm-node", server.uri())
        })
        .unwrap();
        let config = AnchorConfig {
            from_address: "0x00000000000000000000000000000000000000aa".to_string(),
            to_address: "0x00000000000000000000000000000000000000bb".to_string(),
            receipt_poll_interval_ms: 10,
            receipt_poll_attempts: 3,
            ..AnchorConfig::default()
        };
        JsonRpcAnchorClient::new(Arc::new(client), config)
    }

    async fn mount_send(server: &MockServer, root: &str) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({
                "method": "eth_sendTransaction",
                "params": [{
                    "from": "0x00000000000000000000000000000000000000aa",
                    "to": "0x00000000000000000000000000000000000000bb",
                    "data": format!("0x{}", root)
                }]
            })))
            .respond_with(rpc_result(json!(TX)))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_submit_root_confirms() {
        let server = MockServer::start().await;
        let root = "ab".repeat(32);
        mount_send(&server, &root).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionReceipt", "params": [TX]})))
            .respond_with(rpc_result(json!({
                "transactionHash": TX,
                "blockNumber": "0x1b4",
                "status": "0x1"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getBlockByNumber",
                "params": ["0x1b4", false]
            })))
            .respond_with(rpc_result(json!({"number": "0x1b4", "timestamp": "0x6632ab00"})))
            .mount(&server)
            .await;

        let receipt = anchor_client(&server).submit_root(&root).await.unwrap();
        assert_eq!(receipt.tx_reference, TX);
        assert_eq!(receipt.block_number, 436);
        assert_eq!(receipt.block_timestamp.timestamp(), 0x6632ab00);
    }

    #[tokio::test]
    async fn test_reverted_transaction_fails() {
        let server = MockServer::start().await;
        let root = "cd".repeat(32);
        mount_send(&server, &root).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
            .respond_with(rpc_result(json!({
                "transactionHash": TX,
                "blockNumber": "0x10",
                "status": "0x0"
            })))
            .mount(&server)
            .await;

        let err = anchor_client(&server).submit_root(&root).await.unwrap_err();
        assert!(matches!(err, Error::AnchorSubmissionFailed { ref reason, .. } if reason.contains("reverted")));
    }

    #[tokio::test]
    async fn test_receipt_never_available() {
        let server = MockServer::start().await;
        let root = "ef".repeat(32);
        mount_send(&server, &root).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
            .respond_with(rpc_result(Value::Null))
            .expect(3)
            .mount(&server)
            .await;

        let err = anchor_client(&server).submit_root(&root).await.unwrap_err();
        assert!(matches!(err, Error::Rpc { ref message, .. } if message.contains("not mined")));
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "insufficient funds for gas"}
            })))
            .mount(&server)
            .await;

        let err = anchor_client(&server)
            .submit_root(&"01".repeat(32))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_node_outage_is_downstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = anchor_client(&server)
            .submit_root(&"01".repeat(32))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Downstream(resilience::Error::Status { status: 502, .. })
        ));
    }
}

//! Core types for the ledger integrity engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// =========================================================================
// ENTRIES
// =========================================================================

/// One recorded transaction in a hash chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Entry identifier (numbers are accepted and kept as text)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Declared hash of the previous entry; empty or absent for the first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    /// Opaque transaction data
    #[serde(default)]
    pub data: serde_json::Value,
    /// Caller-supplied hash to check against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl LedgerEntry {
    /// Entry with no declared hashes
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            prev_hash: None,
            data,
            hash: None,
        }
    }

    /// Declare the previous hash
    pub fn with_prev_hash(mut self, prev_hash: impl Into<String>) -> Self {
        self.prev_hash = Some(prev_hash.into());
        self
    }

    /// Declare this entry's hash
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Declared previous hash, empty when absent
    pub fn prev_hash(&self) -> &str {
        self.prev_hash.as_deref().unwrap_or("")
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "entry id must be a string or number, got {}",
            other
        ))),
    }
}

// =========================================================================
// ANCHORS
// =========================================================================

/// Outcome of one anchor submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    /// Submitted, not yet confirmed
    Pending,
    /// Confirmed on the external ledger
    Success,
    /// Rejected, timed out or unreachable
    Failed,
}

/// Confirmation returned by an external ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    /// Transaction reference (hash)
    pub tx_reference: String,
    /// Block that includes the transaction
    pub block_number: u64,
    /// Timestamp of that block
    pub block_timestamp: DateTime<Utc>,
}

/// Audit record of an anchor attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRecord {
    /// Anchor ID (UUIDv7)
    pub anchor_id: Uuid,
    /// Anchored Merkle root
    pub root_hash: String,
    /// When the attempt started
    pub timestamp: DateTime<Utc>,
    /// Anchoring method
    pub method: String,
    /// External network name
    pub network: String,
    /// Transaction reference on the external ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_tx_reference: Option<String>,
    /// Status
    pub status: AnchorStatus,
    /// Failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Last anchor the external ledger confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSuccessfulAnchor {
    /// When the anchor was recorded locally
    pub timestamp: DateTime<Utc>,
    /// Anchored root
    pub root_hash: String,
    /// Transaction reference
    pub external_tx_reference: String,
    /// Confirming block
    pub block_number: u64,
    /// Confirming block timestamp
    pub block_timestamp: DateTime<Utc>,
}

/// What a scheduled run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RunOutcome {
    /// A root was anchored
    Anchored {
        /// Anchored root
        root_hash: String,
    },
    /// Nothing to do
    Skipped {
        /// Why the run did nothing
        reason: String,
    },
    /// Submission failed; the root stays pending for the next run
    Failed {
        /// Failure detail
        error: String,
    },
}

/// Summary of the latest scheduled run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRun {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Outcome
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Anchoring view for the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorHealth {
    /// Root of the last valid chain verified
    pub latest_merkle_root: Option<String>,
    /// Last scheduled run
    pub last_anchor_run: Option<AnchorRun>,
    /// Last confirmed anchor
    pub last_successful_anchor: Option<LastSuccessfulAnchor>,
    /// Seconds since the last confirmed block, -1 when never anchored
    pub anchor_lag: i64,
}

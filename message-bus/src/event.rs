//! Event envelope

use crate::types::EventType;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event envelope published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event ID (UUIDv7 for ordering)
    pub id: Uuid,

    /// Event type
    pub event_type: EventType,

    /// Payload (JSON)
    pub payload: serde_json::Value,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Correlation ID (idempotency key, anchor id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Event {
    /// Create a new event
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type,
            payload,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    /// Build an event from any serializable payload
    pub fn from_payload<T: Serialize>(event_type: EventType, payload: &T) -> Result<Self> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// NATS subject for this event
    pub fn subject(&self) -> &'static str {
        self.event_type.subject()
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

//! Notification subjects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A rail accepted a payment
    TransactionRecorded,
    /// A Merkle root was anchored externally
    AuditLogCreated,
}

impl EventType {
    /// NATS subject for this event type
    pub fn subject(&self) -> &'static str {
        match self {
            EventType::TransactionRecorded => "payments.transaction.recorded",
            EventType::AuditLogCreated => "ledger.audit.created",
        }
    }

    /// JetStream stream name for this event type
    pub fn stream_name(&self) -> &'static str {
        match self {
            EventType::TransactionRecorded => "PAYMENT_TRANSACTIONS",
            EventType::AuditLogCreated => "LEDGER_AUDIT",
        }
    }

    /// Every event type
    pub fn all() -> [EventType; 2] {
        [EventType::TransactionRecorded, EventType::AuditLogCreated]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subject())
    }
}

//! Event publishers
//!
//! - [`NatsPublisher`]: NATS core or JetStream with bounded retry
//! - [`LogPublisher`]: writes events to the log when no bus is configured
//! - [`MemoryPublisher`]: keeps events in memory for tests and local runs

use crate::{
    event::Event,
    metrics::{EVENT_PUBLISH_DURATION, EVENT_PUBLISH_TOTAL},
    types::EventType,
    Error, Result,
};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Destination for events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: &Event) -> Result<()>;

    /// Publisher name for logs
    fn name(&self) -> &'static str;
}

/// Publisher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// NATS server URL; `None` selects the logging publisher
    pub url: Option<String>,

    /// Enable JetStream persistence
    pub use_jetstream: bool,

    /// Publish timeout (milliseconds)
    pub publish_timeout_ms: u64,

    /// Max publish attempts
    pub max_retry_attempts: u32,

    /// Initial retry delay (milliseconds)
    pub initial_retry_delay_ms: u64,

    /// Max retry delay (milliseconds)
    pub max_retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            url: None,
            use_jetstream: false,
            publish_timeout_ms: 5_000,
            max_retry_attempts: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 2_000,
        }
    }
}

impl PublisherConfig {
    fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

fn record(subject: &str, start: Instant, result: &Result<()>) {
    EVENT_PUBLISH_DURATION
        .with_label_values(&[subject])
        .observe(start.elapsed().as_secs_f64());
    let status = if result.is_ok() { "success" } else { "error" };
    EVENT_PUBLISH_TOTAL
        .with_label_values(&[subject, status])
        .inc();
}

// =========================================================================
// NATS
// =========================================================================

/// NATS publisher
pub struct NatsPublisher {
    client: async_nats::Client,
    jetstream: Option<jetstream::Context>,
    config: PublisherConfig,
}

impl NatsPublisher {
    /// Connect to the configured NATS server and, with JetStream enabled,
    /// make sure one stream per event type exists
    pub async fn connect(config: PublisherConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| Error::Connection("no NATS URL configured".to_string()))?;

        info!("Connecting to NATS at {}", url);
        let client = async_nats::connect(url.as_str())
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let jetstream = if config.use_jetstream {
            let context = jetstream::new(client.clone());
            for event_type in EventType::all() {
                context
                    .get_or_create_stream(StreamConfig {
                        name: event_type.stream_name().to_string(),
                        subjects: vec![event_type.subject().to_string()],
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::JetStream(e.to_string()))?;
            }
            Some(context)
        } else {
            None
        };

        info!(
            "NATS publisher ready (jetstream: {})",
            jetstream.is_some()
        );

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    /// Publish with exponential backoff retry
    async fn publish_with_retry(&self, subject: &str, payload: Bytes) -> Result<()> {
        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.initial_retry_delay_ms);
        let max_delay = Duration::from_millis(self.config.max_retry_delay_ms);

        loop {
            attempts += 1;

            let timeout = self.config.publish_timeout();
            let result = tokio::time::timeout(timeout, self.publish_once(subject, payload.clone()))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(timeout.as_millis() as u64)));

            match result {
                Ok(()) => {
                    if attempts > 1 {
                        info!("Event published to {} after {} attempts", subject, attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempts >= self.config.max_retry_attempts {
                        error!(
                            "Failed to publish to {} after {} attempts: {}",
                            subject, attempts, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish to {} failed (attempt {}), retrying in {:?}: {}",
                        subject, attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    /// Single publish attempt
    async fn publish_once(&self, subject: &str, payload: Bytes) -> Result<()> {
        match &self.jetstream {
            Some(js) => {
                let ack = js
                    .publish(subject.to_string(), payload)
                    .await
                    .map_err(|e| Error::Publish(e.to_string()))?;
                ack.await
                    .map_err(|e| Error::JetStream(format!("Publish ack failed: {}", e)))?;
            }
            None => {
                self.client
                    .publish(subject.to_string(), payload)
                    .await
                    .map_err(|e| Error::Publish(e.to_string()))?;
                self.client
                    .flush()
                    .await
                    .map_err(|e| Error::Publish(format!("Flush failed: {}", e)))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let start = Instant::now();
        let subject = event.subject();
        let payload = Bytes::from(event.to_bytes()?);

        let result = self.publish_with_retry(subject, payload).await;
        record(subject, start, &result);
        result
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}

// =========================================================================
// LOG
// =========================================================================

/// Publisher that only logs events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let start = Instant::now();
        let payload = serde_json::to_string(&event.payload)?;
        info!(
            subject = event.subject(),
            event_id = %event.id,
            correlation_id = event.correlation_id.as_deref().unwrap_or(""),
            "Event: {}",
            payload
        );
        let result = Ok(());
        record(event.subject(), start, &result);
        result
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// =========================================================================
// MEMORY
// =========================================================================

/// Publisher that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<Event>>,
    fail: bool,
}

impl MemoryPublisher {
    /// Empty publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher that rejects every event
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Events published so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events of one type
    pub fn events_of(&self, event_type: EventType) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        if self.fail {
            return Err(Error::Publish("publisher configured to fail".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

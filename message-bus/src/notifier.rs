//! Fire-and-forget notifications
//!
//! Callers hand events to a bounded queue and return immediately. A
//! background task drains the queue into an [`EventPublisher`]; publish
//! errors are logged there and never reach the caller. A full queue drops
//! the event with a warning.

use crate::{
    event::Event, metrics::NOTIFICATIONS_DROPPED_TOTAL, publisher::EventPublisher,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle for queueing notifications
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Event>,
}

impl Notifier {
    /// Start the delivery task. It exits once every `Notifier` clone has
    /// been dropped and the queue is drained.
    pub fn spawn(publisher: Arc<dyn EventPublisher>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));

        let handle = tokio::spawn(async move {
            info!("Notification delivery started ({} publisher)", publisher.name());
            while let Some(event) = rx.recv().await {
                match publisher.publish(&event).await {
                    Ok(()) => debug!("Delivered {} to {}", event.id, event.subject()),
                    Err(e) => error!(
                        "Failed to deliver {} to {}: {}",
                        event.id,
                        event.subject(),
                        e
                    ),
                }
            }
            info!("Notification delivery stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue an event without waiting
    pub fn notify(&self, event: Event) {
        let subject = event.subject();
        if let Err(e) = self.tx.try_send(event) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "delivery stopped",
            };
            warn!("Dropping notification for {}: {}", subject, reason);
            NOTIFICATIONS_DROPPED_TOTAL
                .with_label_values(&[subject])
                .inc();
        }
    }
}

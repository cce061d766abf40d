//! Background anchoring loop
//!
//! Drives [`AnchorService::run_scheduled`] on a fixed period. The first run
//! happens one full period after start. Ticks missed while a run is still
//! submitting are skipped rather than queued.

use crate::anchor::AnchorService;
use crate::types::{AnchorRun, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Periodic anchoring task
#[derive(Debug, Clone)]
pub struct AnchorScheduler {
    service: Arc<AnchorService>,
    period: Duration,
}

impl AnchorScheduler {
    /// Scheduler using the service's configured interval
    pub fn new(service: Arc<AnchorService>) -> Self {
        let period = service.config().interval();
        Self::with_period(service, period)
    }

    /// Scheduler with an explicit period
    pub fn with_period(service: Arc<AnchorService>, period: Duration) -> Self {
        Self { service, period }
    }

    /// Period between runs
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Execute a single run
    pub async fn run_once(&self) -> AnchorRun {
        let run = self.service.run_scheduled().await;
        match &run.outcome {
            RunOutcome::Anchored { root_hash } => info!("Scheduled anchor of {} succeeded", root_hash),
            RunOutcome::Failed { error } => error!("Scheduled anchor failed: {}", error),
            RunOutcome::Skipped { .. } => {}
        }
        run
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() fires immediately; the first run waits a full period
            ticker.tick().await;

            info!("Anchor scheduler started (every {:?})", self.period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Anchor scheduler stopped");
        })
    }
}

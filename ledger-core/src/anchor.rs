//! Merkle root anchoring
//!
//! [`AnchorService`] owns the anchoring state of the process: the latest
//! root of a valid chain, a bounded history of anchor attempts, the last
//! scheduled run and the last confirmed anchor. Submissions go through an
//! [`AnchorLedger`] one at a time; the submission gate is a single-flight
//! token and no state lock is held while a submission is in flight.

use crate::chain::{verify_chain, ChainVerification};
use crate::config::AnchorConfig;
use crate::crypto::sha256_hex;
use crate::metrics::{
    ANCHOR_LAG_SECONDS, ANCHOR_RUNS_TOTAL, ANCHOR_SUBMISSIONS_TOTAL, ANCHOR_SUBMIT_DURATION,
};
use crate::types::*;
use crate::{Error, Result, ANCHOR_METHOD};
use async_trait::async_trait;
use message_bus::{Event, EventType, Notifier};
use parking_lot::Mutex;
use protocol_core::validation::is_sha256_hex;
use protocol_core::{SharedClock, SystemClock};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// External ledger that can commit a root and report its confirmation
#[async_trait]
pub trait AnchorLedger: Send + Sync + Debug {
    /// Submit `root_hash` and wait until it is confirmed
    async fn submit_root(&self, root_hash: &str) -> Result<AnchorReceipt>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// In-process ledger that confirms every root immediately
///
/// Block numbers increase by one per submission and block timestamps come
/// from the clock. Used when no JSON-RPC endpoint is configured.
#[derive(Debug)]
pub struct LocalAnchorLedger {
    clock: SharedClock,
    block_number: AtomicU64,
}

impl LocalAnchorLedger {
    /// Ledger on the given clock
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            block_number: AtomicU64::new(0),
        }
    }
}

impl Default for LocalAnchorLedger {
    fn default() -> Self {
        Self::new(SystemClock::shared())
    }
}

#[async_trait]
impl AnchorLedger for LocalAnchorLedger {
    async fn submit_root(&self, root_hash: &str) -> Result<AnchorReceipt> {
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_reference = format!(
            "0x{}",
            sha256_hex(format!("{}:{}", root_hash, block_number).as_bytes())
        );
        Ok(AnchorReceipt {
            tx_reference,
            block_number,
            block_timestamp: self.clock.now(),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[derive(Debug, Default)]
struct AnchorState {
    latest_root: Option<String>,
    history: VecDeque<AnchorRecord>,
    last_run: Option<AnchorRun>,
    last_success: Option<LastSuccessfulAnchor>,
}

/// Anchoring state and submission
#[derive(Debug)]
pub struct AnchorService {
    ledger: Arc<dyn AnchorLedger>,
    config: AnchorConfig,
    clock: SharedClock,
    notifier: Option<Notifier>,
    state: Mutex<AnchorState>,
    gate: tokio::sync::Mutex<()>,
}

impl AnchorService {
    /// Create a service submitting to `ledger`
    pub fn new(ledger: Arc<dyn AnchorLedger>, config: AnchorConfig, clock: SharedClock) -> Self {
        Self {
            ledger,
            config,
            clock,
            notifier: None,
            state: Mutex::new(AnchorState::default()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Publish an audit event for every confirmed anchor
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Configuration
    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Verify a chain; a valid non-empty chain's root becomes the anchoring candidate
    pub fn verify(&self, entries: &[LedgerEntry]) -> ChainVerification {
        let result = verify_chain(entries);
        if result.valid_chain && !entries.is_empty() {
            debug!("Latest Merkle root is now {}", result.merkle_root);
            self.state.lock().latest_root = Some(result.merkle_root.clone());
        }
        result
    }

    /// Root waiting to be anchored
    pub fn latest_root(&self) -> Option<String> {
        self.state.lock().latest_root.clone()
    }

    /// Anchor `root_hash` now, waiting for any submission in flight
    pub async fn anchor_root(&self, root_hash: &str) -> Result<AnchorRecord> {
        let root_hash = normalize_root(root_hash)?;
        let _permit = self.gate.lock().await;
        self.submit(&root_hash).await
    }

    /// One scheduled pass: anchor the latest root unless there is nothing new
    /// or a submission is already in flight
    pub async fn run_scheduled(&self) -> AnchorRun {
        let started_at = self.clock.now();

        let outcome = match self.gate.try_lock() {
            Err(_) => RunOutcome::Skipped {
                reason: "anchor submission in progress".to_string(),
            },
            Ok(_permit) => match self.pending_root() {
                Err(reason) => RunOutcome::Skipped {
                    reason: reason.to_string(),
                },
                Ok(root_hash) => match self.submit(&root_hash).await {
                    Ok(_) => RunOutcome::Anchored { root_hash },
                    Err(e) => RunOutcome::Failed {
                        error: e.to_string(),
                    },
                },
            },
        };

        let label = match &outcome {
            RunOutcome::Anchored { .. } => "anchored",
            RunOutcome::Skipped { reason } => {
                debug!("Anchor run skipped: {}", reason);
                "skipped"
            }
            RunOutcome::Failed { .. } => "failed",
        };
        ANCHOR_RUNS_TOTAL.with_label_values(&[label]).inc();

        let run = AnchorRun {
            started_at,
            finished_at: self.clock.now(),
            outcome,
        };
        self.state.lock().last_run = Some(run.clone());
        run
    }

    /// Seconds since the block of the last confirmed anchor, -1 before the first
    pub fn anchor_lag_seconds(&self) -> i64 {
        let lag = match &self.state.lock().last_success {
            Some(last) => (self.clock.now() - last.block_timestamp).num_seconds().max(0),
            None => -1,
        };
        ANCHOR_LAG_SECONDS.set(lag);
        lag
    }

    /// Most recent anchor records, newest first
    pub fn history(&self, limit: usize) -> Vec<AnchorRecord> {
        self.state
            .lock()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Last scheduled run
    pub fn last_run(&self) -> Option<AnchorRun> {
        self.state.lock().last_run.clone()
    }

    /// Last confirmed anchor
    pub fn last_successful_anchor(&self) -> Option<LastSuccessfulAnchor> {
        self.state.lock().last_success.clone()
    }

    /// Anchoring view for health reporting
    pub fn health(&self) -> AnchorHealth {
        let anchor_lag = self.anchor_lag_seconds();
        let state = self.state.lock();
        AnchorHealth {
            latest_merkle_root: state.latest_root.clone(),
            last_anchor_run: state.last_run.clone(),
            last_successful_anchor: state.last_success.clone(),
            anchor_lag,
        }
    }

    fn pending_root(&self) -> std::result::Result<String, &'static str> {
        let state = self.state.lock();
        let root = state.latest_root.clone().ok_or("no verified root")?;
        match &state.last_success {
            Some(last) if last.root_hash == root => Err("root already anchored"),
            _ => Ok(root),
        }
    }

    /// Submit with the gate held by the caller
    async fn submit(&self, root_hash: &str) -> Result<AnchorRecord> {
        let mut record = AnchorRecord {
            anchor_id: Uuid::now_v7(),
            root_hash: root_hash.to_string(),
            timestamp: self.clock.now(),
            method: ANCHOR_METHOD.to_string(),
            network: self.config.network.clone(),
            external_tx_reference: None,
            status: AnchorStatus::Pending,
            error: None,
        };

        info!(
            "Anchoring root {} on {} via {}",
            root_hash,
            self.config.network,
            self.ledger.name()
        );

        let timer = ANCHOR_SUBMIT_DURATION.start_timer();
        let result =
            match tokio::time::timeout(self.config.submit_timeout(), self.ledger.submit_root(root_hash))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::AnchorSubmissionFailed {
                    root_hash: root_hash.to_string(),
                    reason: format!("timed out after {}ms", self.config.submit_timeout_ms),
                }),
            };
        timer.observe_duration();

        match result {
            Ok(receipt) => {
                record.status = AnchorStatus::Success;
                record.external_tx_reference = Some(receipt.tx_reference.clone());
                ANCHOR_SUBMISSIONS_TOTAL.with_label_values(&["success"]).inc();

                {
                    let mut state = self.state.lock();
                    state.last_success = Some(LastSuccessfulAnchor {
                        timestamp: self.clock.now(),
                        root_hash: root_hash.to_string(),
                        external_tx_reference: receipt.tx_reference.clone(),
                        block_number: receipt.block_number,
                        block_timestamp: receipt.block_timestamp,
                    });
                    self.push_history(&mut state, record.clone());
                }
                self.anchor_lag_seconds();

                info!(
                    "Anchored root {} in block {} ({})",
                    root_hash, receipt.block_number, receipt.tx_reference
                );
                self.publish_audit(&record);
                Ok(record)
            }
            Err(e) => {
                let reason = match e {
                    Error::AnchorSubmissionFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                record.status = AnchorStatus::Failed;
                record.error = Some(reason.clone());
                ANCHOR_SUBMISSIONS_TOTAL.with_label_values(&["failed"]).inc();

                self.push_history(&mut self.state.lock(), record);
                error!("Failed to anchor root {}: {}", root_hash, reason);

                Err(Error::AnchorSubmissionFailed {
                    root_hash: root_hash.to_string(),
                    reason,
                })
            }
        }
    }

    fn push_history(&self, state: &mut AnchorState, record: AnchorRecord) {
        while state.history.len() >= self.config.history_limit.max(1) {
            state.history.pop_front();
        }
        state.history.push_back(record);
    }

    fn publish_audit(&self, record: &AnchorRecord) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        match Event::from_payload(EventType::AuditLogCreated, record) {
            Ok(event) => notifier.notify(event.with_correlation_id(record.anchor_id.to_string())),
            Err(e) => warn!("Failed to build audit event for {}: {}", record.anchor_id, e),
        }
    }
}

/// Accept exactly 64 hex characters; stored lower-case
fn normalize_root(root_hash: &str) -> Result<String> {
    let root = root_hash.trim();
    if !is_sha256_hex(root) {
        return Err(Error::InvalidRootHash(format!(
            "expected 64 hex characters, got {:?}",
            root_hash
        )));
    }
    Ok(root.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::entry_digest;
    use chrono::{Duration, TimeZone, Utc};
    use message_bus::MemoryPublisher;
    use protocol_core::ManualClock;
    use serde_json::{json, Value};

    #[derive(Debug)]
    struct FailingLedger;

    #[async_trait]
    impl AnchorLedger for FailingLedger {
        async fn submit_root(&self, _root_hash: &str) -> Result<AnchorReceipt> {
            Err(Error::Rpc {
                code: -32000,
                message: "insufficient funds".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Debug)]
    struct HangingLedger;

    #[async_trait]
    impl AnchorLedger for HangingLedger {
        async fn submit_root(&self, _root_hash: &str) -> Result<AnchorReceipt> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    fn local_service(clock: &Arc<ManualClock>) -> AnchorService {
        AnchorService::new(
            Arc::new(LocalAnchorLedger::new(clock.clone())),
            AnchorConfig::default(),
            clock.clone(),
        )
    }

    fn chain(data: &[Value]) -> Vec<LedgerEntry> {
        let mut prev = String::new();
        data.iter()
            .enumerate()
            .map(|(i, d)| {
                let entry = LedgerEntry::new(i.to_string(), d.clone()).with_prev_hash(prev.clone());
                prev = hex::encode(entry_digest(&prev, d));
                entry
            })
            .collect()
    }

    fn root() -> String {
        "ab".repeat(32)
    }

    #[test]
    fn test_only_valid_chains_become_candidates() {
        let clock = clock();
        let service = local_service(&clock);

        service.verify(&[]);
        assert!(service.latest_root().is_none());

        let mut entries = chain(&[json!({"a": 1}), json!({"a": 2})]);
        let result = service.verify(&entries);
        assert_eq!(service.latest_root(), Some(result.merkle_root.clone()));

        entries[1].prev_hash = Some("00".repeat(32));
        let tampered = service.verify(&entries);
        assert!(!tampered.valid_chain);
        assert_eq!(service.latest_root(), Some(result.merkle_root));
    }

    #[tokio::test]
    async fn test_rejects_malformed_root() {
        let clock = clock();
        let service = local_service(&clock);

        let bad_roots = vec![
            String::new(),
            "abc".to_string(),
            "zz".repeat(32),
            "ab".repeat(33),
        ];
        for bad in &bad_roots {
            assert!(matches!(
                service.anchor_root(bad).await,
                Err(Error::InvalidRootHash(_))
            ));
        }
        assert!(service.history(10).is_empty());
    }

    #[tokio::test]
    async fn test_successful_anchor_and_lag() {
        let clock = clock();
        let service = local_service(&clock);
        assert_eq!(service.anchor_lag_seconds(), -1);

        let record = service.anchor_root(&root().to_uppercase()).await.unwrap();
        assert_eq!(record.status, AnchorStatus::Success);
        assert_eq!(record.root_hash, root());
        assert_eq!(record.method, ANCHOR_METHOD);
        assert_eq!(record.network, "sandbox");
        assert!(record.external_tx_reference.as_deref().unwrap().starts_with("0x"));

        let last = service.last_successful_anchor().unwrap();
        assert_eq!(last.block_number, 1);
        assert_eq!(last.root_hash, root());

        assert_eq!(service.anchor_lag_seconds(), 0);
        clock.advance(Duration::seconds(90));
        assert_eq!(service.anchor_lag_seconds(), 90);
        assert_eq!(service.health().anchor_lag, 90);
    }

    #[tokio::test]
    async fn test_failed_anchor_is_recorded_and_returned() {
        let clock = clock();
        let service = AnchorService::new(Arc::new(FailingLedger), AnchorConfig::default(), clock);

        let err = service.anchor_root(&root()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AnchorSubmissionFailed { ref reason, .. } if reason.contains("insufficient funds")
        ));

        let history = service.history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AnchorStatus::Failed);
        assert!(service.last_successful_anchor().is_none());
        assert_eq!(service.anchor_lag_seconds(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_timeout() {
        let config = AnchorConfig {
            submit_timeout_ms: 500,
            ..AnchorConfig::default()
        };
        let service = AnchorService::new(Arc::new(HangingLedger), config, clock());

        let err = service.anchor_root(&root()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AnchorSubmissionFailed { ref reason, .. } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_scheduled_runs() {
        let clock = clock();
        let service = local_service(&clock);

        let run = service.run_scheduled().await;
        assert_eq!(
            run.outcome,
            RunOutcome::Skipped {
                reason: "no verified root".to_string()
            }
        );

        let verification = service.verify(&chain(&[json!({"n": 1})]));
        let run = service.run_scheduled().await;
        assert_eq!(
            run.outcome,
            RunOutcome::Anchored {
                root_hash: verification.merkle_root.clone()
            }
        );

        let run = service.run_scheduled().await;
        assert_eq!(
            run.outcome,
            RunOutcome::Skipped {
                reason: "root already anchored".to_string()
            }
        );
        assert_eq!(service.last_run(), Some(run));

        service.verify(&chain(&[json!({"n": 1}), json!({"n": 2})]));
        assert!(matches!(
            service.run_scheduled().await.outcome,
            RunOutcome::Anchored { .. }
        ));
        assert_eq!(service.history(10).len(), 2);
    }

    #[tokio::test]
    async fn test_scheduled_run_skips_while_submission_in_flight() {
        let clock = clock();
        let service = local_service(&clock);
        service.verify(&chain(&[json!({"n": 1})]));

        let permit = service.gate.try_lock().unwrap();
        let run = service.run_scheduled().await;
        assert_eq!(
            run.outcome,
            RunOutcome::Skipped {
                reason: "anchor submission in progress".to_string()
            }
        );
        drop(permit);

        assert!(matches!(
            service.run_scheduled().await.outcome,
            RunOutcome::Anchored { .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_run_keeps_root_pending() {
        let clock = clock();
        let service = AnchorService::new(Arc::new(FailingLedger), AnchorConfig::default(), clock);
        service.verify(&chain(&[json!({"n": 1})]));

        assert!(matches!(
            service.run_scheduled().await.outcome,
            RunOutcome::Failed { .. }
        ));
        assert!(matches!(
            service.run_scheduled().await.outcome,
            RunOutcome::Failed { .. }
        ));
        assert_eq!(service.history(10).len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_bounded_newest_first() {
        let clock = clock();
        let config = AnchorConfig {
            history_limit: 2,
            ..AnchorConfig::default()
        };
        let service = AnchorService::new(
            Arc::new(LocalAnchorLedger::new(clock.clone())),
            config,
            clock,
        );

        for c in ['a', 'b', 'c'] {
            service.anchor_root(&c.to_string().repeat(64)).await.unwrap();
        }

        let history = service.history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].root_hash, "c".repeat(64));
        assert_eq!(history[1].root_hash, "b".repeat(64));
        assert_eq!(service.history(1).len(), 1);
    }

    #[tokio::test]
    async fn test_success_publishes_audit_event() {
        let publisher = Arc::new(MemoryPublisher::new());
        let (notifier, handle) = Notifier::spawn(publisher.clone(), 8);

        let clock = clock();
        let service = local_service(&clock).with_notifier(notifier);
        let record = service.anchor_root(&root()).await.unwrap();

        drop(service);
        handle.await.unwrap();

        let events = publisher.events_of(EventType::AuditLogCreated);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["rootHash"], root());
        assert_eq!(
            events[0].correlation_id.as_deref(),
            Some(record.anchor_id.to_string().as_str())
        );
    }
}

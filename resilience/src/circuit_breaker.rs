//! Circuit breaker per downstream dependency
//!
//! One breaker guards one logical dependency for the lifetime of the
//! process. All state changes happen inside [`CircuitBreaker::execute`]
//! under a mutex that is never held across an `.await`.
//!
//! ```text
//!            failures >= threshold
//!   CLOSED ─────────────────────────▶ OPEN
//!     ▲                               │  ▲
//!     │ successes >= threshold        │  │ any failure
//!     │                    now >= next│  │
//!     └──────────── HALF_OPEN ◀───────┘  │
//!                       └────────────────┘
//! ```

use crate::metrics::{
    CIRCUIT_BREAKER_REJECTIONS_TOTAL, CIRCUIT_BREAKER_STATE, CIRCUIT_BREAKER_TRIPS_TOTAL,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use protocol_core::{SharedClock, SystemClock};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Closed (normal operation)
    Closed,
    /// Open (rejecting requests)
    Open,
    /// Half-open (trial calls)
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Successes in half-open that close the circuit
    pub success_threshold: u32,
    /// Budget for a single guarded call (milliseconds)
    pub call_timeout_ms: u64,
    /// Time spent open before a trial call is allowed (milliseconds)
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::DEFAULT_CB_FAILURE_THRESHOLD,
            success_threshold: crate::DEFAULT_CB_SUCCESS_THRESHOLD,
            call_timeout_ms: crate::DEFAULT_CB_CALL_TIMEOUT_MS,
            reset_timeout_ms: crate::DEFAULT_CB_RESET_TIMEOUT_MS,
        }
    }
}

impl CircuitBreakerConfig {
    /// Call timeout as a [`Duration`]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reset timeout as a chrono duration
    pub fn reset_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.reset_timeout_ms as i64)
    }
}

/// Error returned by a guarded call
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation
    #[error("circuit open for {dependency} until {retry_at}")]
    Open {
        /// Dependency name
        dependency: String,
        /// When a trial call becomes possible
        retry_at: DateTime<Utc>,
    },

    /// The operation exceeded the call timeout
    #[error("call to {dependency} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Dependency name
        dependency: String,
        /// Configured budget
        after: Duration,
    },

    /// The operation itself failed
    #[error("{0}")]
    Inner(E),
}

/// State change notification (failure isolation signal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerTransition {
    /// Dependency name
    pub dependency: String,
    /// Previous state
    pub from: CircuitState,
    /// New state
    pub to: CircuitState,
    /// Transition time
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    /// Dependency name
    pub dependency: String,
    /// Current state
    pub state: CircuitState,
    /// Failures counted in the current closed period
    pub failure_count: u32,
    /// Successes counted in the current half-open period
    pub success_count: u32,
    /// Earliest trial time while open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt_at: Option<DateTime<Utc>>,
}

/// Circuit breaker guarding one dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    clock: SharedClock,
    transitions: broadcast::Sender<BreakerTransition>,
}

impl CircuitBreaker {
    /// Create a breaker on the system clock
    pub fn new(dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(dependency, config, SystemClock::shared())
    }

    /// Create a breaker reading time from `clock`
    pub fn with_clock(
        dependency: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Self {
        let dependency = dependency.into();
        let (transitions, _) = broadcast::channel(64);

        CIRCUIT_BREAKER_STATE
            .with_label_values(&[&dependency])
            .set(CircuitState::Closed.gauge_value());

        Self {
            dependency,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt_at: None,
            }),
            clock,
            transitions,
        }
    }

    /// Dependency name
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Current counters
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            next_attempt_at: state.next_attempt_at,
        }
    }

    /// Receive state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerTransition> {
        self.transitions.subscribe()
    }

    /// Run `operation`; every `Err` counts as a failure
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(operation, |_| true).await
    }

    /// Run `operation`; an `Err` counts as a failure only when
    /// `counts_as_failure` says so, otherwise the dependency is treated as
    /// having answered correctly
    pub async fn execute_classified<T, E, F, Fut, C>(
        &self,
        operation: F,
        counts_as_failure: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        if let Err(retry_at) = self.acquire() {
            CIRCUIT_BREAKER_REJECTIONS_TOTAL
                .with_label_values(&[&self.dependency])
                .inc();
            return Err(BreakerError::Open {
                dependency: self.dependency.clone(),
                retry_at,
            });
        }

        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                if counts_as_failure(&err) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                warn!(
                    "Call to {} exceeded {}ms budget",
                    self.dependency,
                    timeout.as_millis()
                );
                self.record_failure();
                Err(BreakerError::Timeout {
                    dependency: self.dependency.clone(),
                    after: timeout,
                })
            }
        }
    }

    /// Reset to closed (manual operator intervention)
    pub fn reset(&self) {
        info!("Manually resetting circuit breaker for {}", self.dependency);
        let transition = {
            let mut state = self.state.lock();
            let from = state.state;
            state.state = CircuitState::Closed;
            state.failure_count = 0;
            state.success_count = 0;
            state.next_attempt_at = None;
            (from != CircuitState::Closed).then_some(from)
        };
        if let Some(from) = transition {
            self.emit(from, CircuitState::Closed);
        }
    }

    /// Admit a call or return the time the circuit may be retried
    fn acquire(&self) -> Result<(), DateTime<Utc>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let next = state.next_attempt_at.unwrap_or(now);
                if now < next {
                    return Err(next);
                }
                state.state = CircuitState::HalfOpen;
                state.success_count = 0;
                state.next_attempt_at = None;
                drop(state);

                info!("Circuit breaker half-opening for {}", self.dependency);
                self.emit(CircuitState::Open, CircuitState::HalfOpen);
                Ok(())
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    drop(state);

                    info!("Circuit breaker closing for {}", self.dependency);
                    self.emit(CircuitState::HalfOpen, CircuitState::Closed);
                }
            }
            // A call admitted before the circuit opened finished late
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    let failures = state.failure_count;
                    state.state = CircuitState::Open;
                    state.next_attempt_at = Some(now + self.config.reset_timeout());
                    drop(state);

                    warn!(
                        "Circuit breaker opening for {} after {} failures",
                        self.dependency, failures
                    );
                    self.trip(CircuitState::Closed);
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.success_count = 0;
                state.next_attempt_at = Some(now + self.config.reset_timeout());
                drop(state);

                warn!("Circuit breaker re-opening for {}", self.dependency);
                self.trip(CircuitState::HalfOpen);
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&self, from: CircuitState) {
        CIRCUIT_BREAKER_TRIPS_TOTAL
            .with_label_values(&[&self.dependency])
            .inc();
        self.emit(from, CircuitState::Open);
    }

    fn emit(&self, from: CircuitState, to: CircuitState) {
        CIRCUIT_BREAKER_STATE
            .with_label_values(&[&self.dependency])
            .set(to.gauge_value());

        // No subscribers is fine
        let _ = self.transitions.send(BreakerTransition {
            dependency: self.dependency.clone(),
            from,
            to,
            at: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_core::{Clock, ManualClock};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(failure_threshold: u32, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            call_timeout_ms: 1_000,
            reset_timeout_ms: 60_000,
        }
    }

    fn breaker(cfg: CircuitBreakerConfig) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (
            CircuitBreaker::with_clock("test-dependency", cfg, clock.clone()),
            clock,
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Ok::<_, &'static str>(()) }).await
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let (cb, _clock) = breaker(config(3, 2));

        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = cb
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_when_closed() {
        let (cb, _clock) = breaker(config(3, 2));

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().failure_count, 0);

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_reset_timeout() {
        let (cb, clock) = breaker(config(1, 2));

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(chrono::Duration::seconds(59));
        assert!(matches!(succeed(&cb).await, Err(BreakerError::Open { .. })));

        clock.advance(chrono::Duration::seconds(1));
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 1);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn test_failure_in_half_open_reopens_immediately() {
        let (cb, clock) = breaker(config(1, 2));

        fail(&cb).await.unwrap_err();
        clock.advance(chrono::Duration::seconds(60));

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        fail(&cb).await.unwrap_err();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(
            snapshot.next_attempt_at,
            Some(clock.now() + chrono::Duration::seconds(60))
        );

        // Fresh cooldown: still open just before it expires
        clock.advance(chrono::Duration::seconds(30));
        assert!(matches!(succeed(&cb).await, Err(BreakerError::Open { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cfg = CircuitBreakerConfig {
            call_timeout_ms: 100,
            ..config(1, 1)
        };
        let (cb, _clock) = breaker(cfg);

        let result = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Timeout { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_classified_errors_do_not_trip() {
        let (cb, _clock) = breaker(config(1, 1));

        let result = cb
            .execute_classified(|| async { Err::<(), _>(404u16) }, |status| *status >= 500)
            .await;
        assert!(matches!(result, Err(BreakerError::Inner(404))));
        assert_eq!(cb.state(), CircuitState::Closed);

        let result = cb
            .execute_classified(|| async { Err::<(), _>(503u16) }, |status| *status >= 500)
            .await;
        assert!(matches!(result, Err(BreakerError::Inner(503))));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_transitions_are_broadcast() {
        let (cb, clock) = breaker(config(1, 1));
        let mut rx = cb.subscribe();

        fail(&cb).await.unwrap_err();
        clock.advance(chrono::Duration::seconds(60));
        succeed(&cb).await.unwrap();

        let opened = rx.recv().await.unwrap();
        assert_eq!((opened.from, opened.to), (CircuitState::Closed, CircuitState::Open));
        let half = rx.recv().await.unwrap();
        assert_eq!((half.from, half.to), (CircuitState::Open, CircuitState::HalfOpen));
        let closed = rx.recv().await.unwrap();
        assert_eq!((closed.from, closed.to), (CircuitState::HalfOpen, CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_not_lost() {
        let clock = Arc::new(ManualClock::starting_now());
        let cb = Arc::new(CircuitBreaker::with_clock("concurrent", config(50, 1), clock));

        let mut handles = Vec::new();
        for _ in 0..49 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move {
                let _ = cb.execute(|| async { Err::<(), _>("boom") }).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 49);
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let (cb, _clock) = breaker(config(1, 1));
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        succeed(&cb).await.unwrap();
    }
}

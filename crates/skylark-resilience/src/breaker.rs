//! Circuit breaker guarding one external collaborator.
//!
//! One breaker is created per protected service at process start and shared
//! behind an `Arc`. State transitions:
//! Closed -> Open after `failure_threshold` consecutive failures;
//! Open -> HalfOpen once `recovery_timeout` has elapsed since the last
//! failure; HalfOpen -> Closed when the single trial call succeeds, back to
//! Open when it fails. A per-call timeout is enforced inside the breaker so
//! a hung collaborator counts as a failure.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use skylark_core::config::ResilienceConfig;

/// Tuning knobs for one breaker.
#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before permitting a trial call.
    pub recovery_timeout: Duration,
    /// Per-call timeout; an overrun counts as a failure.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl BreakerConfig {
    /// Build from the application's resilience settings.
    pub fn from_settings(settings: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_millis(settings.recovery_timeout_ms),
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
        }
    }
}

/// Externally visible breaker state label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker, exposed on the health endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub status: BreakerStatus,
    pub consecutive_failures: u32,
}

enum State {
    Closed { failures: u32 },
    Open { last_failure: Instant, failures: u32 },
    HalfOpen { failures: u32 },
}

/// Error produced by a guarded call.
#[derive(Debug, Error)]
pub enum CallError<E>
where
    E: std::error::Error,
{
    /// The circuit is open and no fallback was supplied.
    #[error("'{service}' is unavailable: circuit open")]
    Open { service: String },

    /// The call exceeded the breaker's per-call timeout.
    #[error("'{service}' timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    /// The underlying operation failed.
    #[error(transparent)]
    Inner(E),
}

/// Circuit breaker for one named collaborator.
pub struct CircuitBreaker {
    service: String,
    config: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    /// Name of the collaborator this breaker protects.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Run `op` through the breaker. When the circuit is open the operation
    /// is not invoked at all.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        if !self.try_acquire() {
            debug!(service = %self.service, "circuit open, call short-circuited");
            return Err(CallError::Open {
                service: self.service.clone(),
            });
        }

        match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(CallError::Inner(e))
            }
            Err(_) => {
                self.record_failure();
                Err(CallError::Timeout {
                    service: self.service.clone(),
                    timeout_ms: self.config.call_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Run `op` through the breaker, substituting `fallback` for any failure
    /// or an open circuit. Failures are still recorded against the breaker
    /// before the substitution happens.
    pub async fn call_with_fallback<T, E, F, Fut, FB>(&self, op: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
        FB: FnOnce() -> T,
    {
        match self.call(op).await {
            Ok(value) => value,
            Err(e) => {
                warn!(service = %self.service, error = %e, "substituting fallback result");
                fallback()
            }
        }
    }

    /// Current state snapshot for observability.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock_state();
        let (status, failures) = match &*state {
            State::Closed { failures } => (BreakerStatus::Closed, *failures),
            State::Open { failures, .. } => (BreakerStatus::Open, *failures),
            State::HalfOpen { failures } => (BreakerStatus::HalfOpen, *failures),
        };
        BreakerSnapshot {
            service: self.service.clone(),
            status,
            consecutive_failures: failures,
        }
    }

    /// Administrative reset back to closed with a clean failure count.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        *state = State::Closed { failures: 0 };
        info!(service = %self.service, "circuit breaker reset");
    }

    // -- State transitions --

    /// Decide whether a call may proceed, moving Open -> HalfOpen when the
    /// recovery timeout has elapsed. Exactly one trial call is admitted while
    /// half-open; concurrent callers are short-circuited until it resolves.
    fn try_acquire(&self) -> bool {
        let mut state = self.lock_state();
        match &*state {
            State::Closed { .. } => true,
            State::Open {
                last_failure,
                failures,
            } => {
                if last_failure.elapsed() >= self.config.recovery_timeout {
                    info!(service = %self.service, "circuit half-open, admitting trial call");
                    *state = State::HalfOpen {
                        failures: *failures,
                    };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { .. } => false,
        }
    }

    fn record_success(&self) {
        let mut state = self.lock_state();
        match &*state {
            State::Closed { .. } => {
                *state = State::Closed { failures: 0 };
            }
            State::HalfOpen { .. } => {
                info!(service = %self.service, "trial call succeeded, circuit closed");
                *state = State::Closed { failures: 0 };
            }
            // A straggler from before the circuit opened; the open state and
            // its recovery clock stand.
            State::Open { .. } => {}
        }
    }

    fn record_failure(&self) {
        let mut state = self.lock_state();
        match &mut *state {
            State::Closed { failures } => {
                *failures += 1;
                if *failures >= self.config.failure_threshold {
                    warn!(
                        service = %self.service,
                        failures = *failures,
                        "failure threshold reached, circuit opened"
                    );
                    *state = State::Open {
                        last_failure: Instant::now(),
                        failures: *failures,
                    };
                }
            }
            State::HalfOpen { failures } => {
                warn!(service = %self.service, "trial call failed, circuit reopened");
                *state = State::Open {
                    last_failure: Instant::now(),
                    failures: *failures + 1,
                };
            }
            State::Open { last_failure, .. } => {
                // Recovery is counted from the most recent failure.
                *last_failure = Instant::now();
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        // The state enum holds no invariants a panicking thread could break
        // mid-update, so a poisoned lock is safe to recover.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

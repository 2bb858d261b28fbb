//! Consecutive-failure circuit breaker.
//!
//! The breaker opens after `max_failures` consecutive failures and sheds every
//! call until `reset_timeout` has passed since the last failure. The first
//! call after that is let through unconditionally with the counter already
//! reset; there is no half-open probing state.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! await, so concurrent callers cannot lose increments.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rendezvous_types::error::MeetupError;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    open: bool,
    last_failure_at: Option<Instant>,
}

/// Point-in-time view of a breaker, for health reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub failure_count: u32,
    pub open: bool,
}

/// Circuit breaker shared by every caller of one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    max_failures: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            max_failures: max_failures.max(1),
            reset_timeout,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, BreakerState> {
        // The state is plain counters, still consistent after a panic elsewhere.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed.
    ///
    /// Fails with `ServiceUnavailable` while the circuit is open and the
    /// reset timeout has not elapsed. Once it has, the circuit closes and the
    /// failure count restarts from zero before the call is attempted.
    pub fn try_acquire(&self) -> Result<(), MeetupError> {
        let mut state = self.state();
        if !state.open {
            return Ok(());
        }

        let cooled_down = state
            .last_failure_at
            .is_none_or(|at| at.elapsed() >= self.reset_timeout);
        if !cooled_down {
            return Err(MeetupError::ServiceUnavailable);
        }

        state.open = false;
        state.failure_count = 0;
        info!(dependency = %self.name, "circuit reset");
        Ok(())
    }

    pub fn record_success(&self) {
        let mut state = self.state();
        state.failure_count = 0;
        state.open = false;
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Instant::now());
        if !state.open && state.failure_count >= self.max_failures {
            state.open = true;
            warn!(
                dependency = %self.name,
                failures = state.failure_count,
                reset_timeout_ms = self.reset_timeout.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        BreakerSnapshot {
            failure_count: state.failure_count,
            open: state.open,
        }
    }

    /// Run `op` through the breaker.
    ///
    /// The operation is not started at all while the circuit is open. Any
    /// error it returns counts as a failure.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, MeetupError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MeetupError>>,
    {
        self.try_acquire()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

//! Circuit breaker state machine.
//!
//! One breaker exists per [`CommandKey`], consuming that key's rolling
//! metrics window to decide whether requests may reach the downstream.
//!
//! # States
//!
//! ```text
//! Closed ──[volume >= minimum AND error% >= threshold]──> Open
//!                                                           │
//!                                                           │ [sleep window elapsed,
//!                                                           │  one probe admitted]
//!                                                           ▼
//!                                                        HalfOpen
//!                                                           │
//!                  ┌────────────────────────────────────────┴──────────────┐
//!                  │                                                       │
//!          [probe succeeds]                                        [probe fails]
//!                  │                                                       │
//!                  ▼                                                       ▼
//!           Closed (stats reset)                         Open (sleep window restarts)
//! ```
//!
//! The trip check runs at admission time: the first invocation that observes
//! threshold and volume satisfied transitions the breaker to Open and is
//! itself short-circuited. While a half-open probe is in flight every other
//! arrival is rejected exactly as if the breaker were open.

use crate::config::ConfigProperties;
use crate::key::CommandKey;
use crate::window::{HealthSnapshot, Outcome, RollingWindow};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Externally observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Requests pass through; outcomes feed the rolling window
    Closed,
    /// Requests are short-circuited until the sleep window elapses
    Open,
    /// A single probe request is in flight; everyone else is rejected
    HalfOpen,
}

impl State {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Admission decision for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; proceed normally
    Admitted,
    /// Breaker was open and the sleep window elapsed; this invocation is the
    /// single recovery probe and must report its result back
    Probe,
    /// Short-circuit: do not touch the semaphore or the downstream
    Rejected,
}

#[derive(Debug, Clone, Copy)]
enum Inner {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { opened_at: Instant },
}

impl Inner {
    const fn state(self) -> State {
        match self {
            Self::Closed => State::Closed,
            Self::Open { .. } => State::Open,
            Self::HalfOpen { .. } => State::HalfOpen,
        }
    }
}

/// Per-command circuit breaker owning that command's rolling window.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: CommandKey,
    error_threshold_percentage: u32,
    minimum_request_volume: u64,
    sleep_window: Duration,
    window: RollingWindow,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `key` with a fresh rolling window.
    #[must_use]
    pub fn new(key: CommandKey, config: &ConfigProperties) -> Self {
        Self {
            key,
            error_threshold_percentage: config.error_threshold_percentage,
            minimum_request_volume: config.minimum_request_volume,
            sleep_window: config.sleep_window,
            window: RollingWindow::new(config.rolling_window, config.rolling_window_buckets),
            inner: Mutex::new(Inner::Closed),
        }
    }

    /// Decide whether one invocation may proceed.
    ///
    /// Runs before semaphore acquisition and before the timeout starts; a
    /// rejected invocation never consumes a concurrency slot.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match *inner {
            Inner::Closed => {
                let snapshot = self.window.snapshot();
                if snapshot.total >= self.minimum_request_volume
                    && snapshot.error_percentage >= self.error_threshold_percentage
                {
                    tracing::warn!(
                        command = %self.key,
                        total = snapshot.total,
                        error_percentage = snapshot.error_percentage,
                        "circuit breaker tripping CLOSED -> OPEN"
                    );
                    self.count_transition(State::Closed, State::Open);
                    *inner = Inner::Open {
                        opened_at: Instant::now(),
                    };
                    Admission::Rejected
                } else {
                    Admission::Admitted
                }
            }
            Inner::Open { opened_at } => {
                if opened_at.elapsed() >= self.sleep_window {
                    tracing::info!(
                        command = %self.key,
                        "circuit breaker transitioning OPEN -> HALF_OPEN, admitting probe"
                    );
                    self.count_transition(State::Open, State::HalfOpen);
                    *inner = Inner::HalfOpen { opened_at };
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            // Probe already in flight; treat like open.
            Inner::HalfOpen { .. } => Admission::Rejected,
        }
    }

    /// Report that the half-open probe completed successfully.
    ///
    /// Closes the breaker and resets the window so the next trip decision
    /// starts from clean statistics.
    pub fn on_probe_success(&self) {
        let mut inner = self.lock();
        if matches!(*inner, Inner::HalfOpen { .. }) {
            tracing::info!(
                command = %self.key,
                "circuit breaker transitioning HALF_OPEN -> CLOSED (recovered)"
            );
            self.count_transition(State::HalfOpen, State::Closed);
            *inner = Inner::Closed;
            self.window.reset();
        }
    }

    /// Report that the half-open probe failed or timed out.
    ///
    /// Re-opens the breaker; the sleep window restarts from now.
    pub fn on_probe_failure(&self) {
        let mut inner = self.lock();
        if matches!(*inner, Inner::HalfOpen { .. }) {
            tracing::warn!(
                command = %self.key,
                "circuit breaker transitioning HALF_OPEN -> OPEN (probe failed)"
            );
            self.count_transition(State::HalfOpen, State::Open);
            *inner = Inner::Open {
                opened_at: Instant::now(),
            };
        }
    }

    /// Give up a probe admission without a verdict.
    ///
    /// Used when the probe lost the execution-permit race before reaching
    /// the downstream: the breaker returns to Open with its original opening
    /// time intact, so the next arrival may probe immediately.
    pub fn abort_probe(&self) {
        let mut inner = self.lock();
        if let Inner::HalfOpen { opened_at } = *inner {
            tracing::debug!(
                command = %self.key,
                "circuit breaker transitioning HALF_OPEN -> OPEN (probe aborted, sleep window kept)"
            );
            self.count_transition(State::HalfOpen, State::Open);
            *inner = Inner::Open { opened_at };
        }
    }

    /// Record one execution attempt outcome into the rolling window.
    pub fn record(&self, outcome: Outcome) {
        self.window.record(outcome);
    }

    /// Current state, for observability.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock().state()
    }

    /// Aggregated view of the rolling window, for observability.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.window.snapshot()
    }

    fn count_transition(&self, from: State, to: State) {
        metrics::counter!(
            "failguard.breaker.state_change",
            "command" => self.key.as_str().to_owned(),
            "from" => from.as_str(),
            "to" => to.as_str(),
        )
        .increment(1);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn breaker(config: &ConfigProperties) -> CircuitBreaker {
        CircuitBreaker::new(CommandKey::from("test"), config)
    }

    fn fill_with_failures(breaker: &CircuitBreaker, count: u64) {
        for _ in 0..count {
            assert_eq!(breaker.admit(), Admission::Admitted);
            breaker.record(Outcome::Failure);
        }
    }

    #[test]
    fn starts_closed_and_admits() {
        let config = ConfigProperties::default();
        let breaker = breaker(&config);
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.admit(), Admission::Admitted);
    }

    #[test]
    fn does_not_trip_below_minimum_volume() {
        let config = ConfigProperties::default();
        let breaker = breaker(&config);

        // 19 failures: 100% errors but volume gate not met.
        fill_with_failures(&breaker, 19);
        assert_eq!(breaker.admit(), Admission::Admitted);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn trips_on_the_next_admission_once_threshold_met() {
        let config = ConfigProperties::default();
        let breaker = breaker(&config);

        fill_with_failures(&breaker, 20);
        assert_eq!(breaker.admit(), Admission::Rejected);
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn stays_closed_when_error_percentage_below_threshold() {
        let config = ConfigProperties::default();
        let breaker = breaker(&config);

        // 30 requests, 40% errors, threshold 50%.
        for _ in 0..18 {
            assert_eq!(breaker.admit(), Admission::Admitted);
            breaker.record(Outcome::Success);
        }
        for _ in 0..12 {
            assert_eq!(breaker.admit(), Admission::Admitted);
            breaker.record(Outcome::Failure);
        }
        assert_eq!(breaker.admit(), Admission::Admitted);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn rejects_until_sleep_window_elapses_then_admits_one_probe() {
        let config = ConfigProperties::builder()
            .sleep_window(Duration::from_millis(100))
            .build();
        let breaker = breaker(&config);

        fill_with_failures(&breaker, 20);
        assert_eq!(breaker.admit(), Admission::Rejected);

        // Strictly before the sleep window: still rejected.
        assert_eq!(breaker.admit(), Admission::Rejected);

        std::thread::sleep(Duration::from_millis(150));

        // Exactly one probe, then back to rejecting while it is in flight.
        assert_eq!(breaker.admit(), Admission::Probe);
        assert_eq!(breaker.state(), State::HalfOpen);
        assert_eq!(breaker.admit(), Admission::Rejected);
    }

    #[test]
    fn probe_success_closes_and_resets_statistics() {
        let config = ConfigProperties::builder()
            .sleep_window(Duration::from_millis(50))
            .build();
        let breaker = breaker(&config);

        fill_with_failures(&breaker, 20);
        assert_eq!(breaker.admit(), Admission::Rejected);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.admit(), Admission::Probe);

        breaker.record(Outcome::Success);
        breaker.on_probe_success();

        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.health().total, 0);
        assert_eq!(breaker.admit(), Admission::Admitted);
    }

    #[test]
    fn probe_failure_reopens_and_restarts_sleep_window() {
        let config = ConfigProperties::builder()
            .sleep_window(Duration::from_millis(100))
            .build();
        let breaker = breaker(&config);

        fill_with_failures(&breaker, 20);
        assert_eq!(breaker.admit(), Admission::Rejected);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(breaker.admit(), Admission::Probe);

        breaker.on_probe_failure();
        assert_eq!(breaker.state(), State::Open);

        // Sleep window restarted from the failure, so an immediate retry is rejected.
        assert_eq!(breaker.admit(), Admission::Rejected);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(breaker.admit(), Admission::Probe);
    }

    #[test]
    fn aborted_probe_keeps_original_opening_time() {
        let config = ConfigProperties::builder()
            .sleep_window(Duration::from_millis(50))
            .build();
        let breaker = breaker(&config);

        fill_with_failures(&breaker, 20);
        assert_eq!(breaker.admit(), Admission::Rejected);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.admit(), Admission::Probe);

        breaker.abort_probe();
        assert_eq!(breaker.state(), State::Open);

        // The sleep window already elapsed, so the next arrival probes again.
        assert_eq!(breaker.admit(), Admission::Probe);
    }
}

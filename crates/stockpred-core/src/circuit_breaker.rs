//! Upstream circuit breaker for market-data calls.
//!
//! After `failure_threshold` consecutive failures the breaker rejects calls
//! for `open_timeout`, then lets exactly one trial call through. A successful
//! trial closes it; a failed one re-opens it immediately. A trial that never
//! reports back (its caller was dropped) is replaced after another
//! `open_timeout`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant, failures: u32 },
    Trial { since: Instant, failures: u32 },
}

impl Phase {
    const fn state(self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::Trial { .. } => CircuitState::HalfOpen,
        }
    }

    const fn failures(self) -> u32 {
        match self {
            Self::Closed { failures }
            | Self::Open { failures, .. }
            | Self::Trial { failures, .. } => failures,
        }
    }
}

/// Shared by every request that goes to the same upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    // Phase is a plain value; a panicked holder cannot leave it half-written.
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the next upstream call may go out. An expired open breaker
    /// admits the caller as its single half-open trial.
    pub fn allow_request(&self) -> bool {
        let mut phase = self.phase();
        match *phase {
            Phase::Closed { .. } => true,
            Phase::Open { since, failures } | Phase::Trial { since, failures } => {
                if since.elapsed() < self.config.open_timeout {
                    return false;
                }
                tracing::debug!(failures, "market data circuit admitting trial call");
                *phase = Phase::Trial {
                    since: Instant::now(),
                    failures,
                };
                true
            }
        }
    }

    pub fn record_success(&self) {
        *self.phase() = Phase::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut phase = self.phase();
        let failures = phase.failures().saturating_add(1);
        let trips = match *phase {
            Phase::Trial { .. } => true,
            Phase::Closed { .. } => failures >= self.config.failure_threshold,
            Phase::Open { .. } => false,
        };

        *phase = if trips {
            tracing::warn!(failures, "market data circuit opened");
            Phase::Open {
                since: Instant::now(),
                failures,
            }
        } else {
            match *phase {
                Phase::Open { since, .. } => Phase::Open { since, failures },
                _ => Phase::Closed { failures },
            }
        };
    }

    /// Time until the breaker admits another trial call; `None` while closed.
    pub fn retry_after(&self) -> Option<Duration> {
        match *self.phase() {
            Phase::Open { since, .. } | Phase::Trial { since, .. } => {
                Some(self.config.open_timeout.saturating_sub(since.elapsed()))
            }
            Phase::Closed { .. } => None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.phase().state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.phase().failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            open_timeout: Duration::from_millis(open_timeout_ms),
        })
    }

    #[test]
    fn trips_only_once_threshold_is_reached() {
        let breaker = breaker(2, 10_000);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.retry_after().is_none());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
        assert!(breaker.retry_after().expect("open") > Duration::from_secs(9));
    }

    #[test]
    fn failed_trial_reopens_without_waiting_for_threshold() {
        let breaker = breaker(3, 1);
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(2));

        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 4);
    }

    #[test]
    fn half_open_admits_a_single_trial_call() {
        let breaker = breaker(1, 50);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(60));

        let admitted: Vec<bool> = (0..5).map(|_| breaker.allow_request()).collect();

        assert_eq!(admitted, vec![true, false, false, false, false]);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.retry_after().is_some());
    }

    #[test]
    fn unanswered_trial_is_replaced_after_open_timeout() {
        let breaker = breaker(1, 20);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.allow_request());
        assert!(!breaker.allow_request());

        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.allow_request());
    }

    #[test]
    fn successful_trial_closes_and_forgets_failures() {
        let breaker = breaker(1, 1);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(2));
        assert!(breaker.allow_request());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }
}

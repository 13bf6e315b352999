use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::Mutex;
use crate::config::circuit_breaker::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("CLOSED"),
            CircuitState::Open => f.write_str("OPEN"),
            CircuitState::HalfOpen => f.write_str("HALF_OPEN"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Rolling outcome window, newest at the back; `true` means failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_probes: u32,
}

/// Failure-rate circuit breaker around the delivery endpoint. While OPEN the
/// caller sees an immediate transient error instead of an API call; after
/// `reset_timeout` a bounded set of probes decides between re-opening and
/// closing.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_probes: 0,
            }),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Whether a call may proceed right now. Flips OPEN to HALF_OPEN once
    /// the reset timeout has elapsed, and admits a bounded number of probes
    /// while HALF_OPEN.
    pub async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!("Circuit breaker transitioning to HALF_OPEN");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probes = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_probes {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::info!("Circuit breaker closing after successful probe");
                inner.state = CircuitState::Closed;
                inner.window.clear();
                inner.opened_at = None;
                inner.half_open_probes = 0;
            }
            CircuitState::Closed => {
                Self::push_outcome(&mut inner.window, false, self.config.volume_threshold);
            }
            CircuitState::Open => {}
        }

        metrics::gauge!(crate::app::services::metrics::CIRCUIT_STATE).set(inner.state.as_gauge());
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!("Circuit breaker re-opening after failed probe");
                Self::trip(&mut inner);
            }
            CircuitState::Closed => {
                Self::push_outcome(&mut inner.window, true, self.config.volume_threshold);

                let volume = inner.window.len();
                if volume >= self.config.volume_threshold {
                    let failures = inner.window.iter().filter(|failed| **failed).count();
                    let rate = failures as f64 / volume as f64;
                    if rate >= self.config.error_threshold {
                        tracing::warn!(
                            failure_rate = rate,
                            volume,
                            "Circuit breaker tripping OPEN"
                        );
                        Self::trip(&mut inner);
                    }
                }
            }
            CircuitState::Open => {}
        }

        metrics::gauge!(crate::app::services::metrics::CIRCUIT_STATE).set(inner.state.as_gauge());
    }

    fn trip(inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
        inner.half_open_probes = 0;
    }

    fn push_outcome(window: &mut VecDeque<bool>, failed: bool, volume_threshold: usize) {
        // Keep twice the volume threshold so the rate reflects recent
        // behaviour rather than all history.
        let cap = volume_threshold.saturating_mul(2).max(1);
        if window.len() >= cap {
            window.pop_front();
        }
        window.push_back(failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(reset_timeout: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            call_timeout: Duration::from_secs(5),
            error_threshold: 0.5,
            reset_timeout,
            volume_threshold: 4,
            half_open_max_probes: 2,
        }
    }

    #[tokio::test]
    async fn stays_closed_below_volume_threshold() {
        let breaker = CircuitBreaker::new(config(Duration::from_secs(60)));
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await);
    }

    #[tokio::test]
    async fn trips_on_failure_rate_over_volume() {
        let breaker = CircuitBreaker::new(config(Duration::from_secs(60)));
        breaker.record_success().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.try_acquire().await);
    }

    #[tokio::test]
    async fn half_open_after_reset_and_closes_on_success() {
        let breaker = CircuitBreaker::new(config(Duration::from_millis(10)));
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.try_acquire().await);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(config(Duration::from_millis(10)));
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.try_acquire().await);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.try_acquire().await);
    }

    #[tokio::test]
    async fn half_open_bounds_probes() {
        let breaker = CircuitBreaker::new(config(Duration::from_millis(10)));
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(breaker.try_acquire().await);
        assert!(breaker.try_acquire().await);
        assert!(!breaker.try_acquire().await);
    }
}

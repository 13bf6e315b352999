use rand::Rng;
use std::time::Duration;
use crate::config::queue::{BackoffKind, QueueConfig};

/// Delay schedule between delivery attempts: exponential (or linear)
/// backoff, capped, with uniform jitter so herds of retries spread out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffKind,
}

const JITTER_FRACTION: f64 = 0.25;

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_delay,
            max_delay: config.max_retry_delay,
            backoff: config.retry_backoff,
        }
    }

    /// Deterministic delay for the given zero-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = match self.backoff {
            BackoffKind::Exponential => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffKind::Linear => self.base_delay.saturating_mul(attempt + 1),
        };
        raw.min(self.max_delay)
    }

    /// `delay_for` plus uniform jitter in [0, 25%] of the delay.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        let jitter_cap = base.mul_f64(JITTER_FRACTION);
        if jitter_cap.is_zero() {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=jitter_cap);
        base + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: BackoffKind) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff,
        }
    }

    #[test]
    fn exponential_doubles_per_attempt() {
        let policy = policy(BackoffKind::Exponential);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn linear_grows_by_base() {
        let policy = policy(BackoffKind::Linear);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
    }

    #[test]
    fn delay_is_capped() {
        let policy = policy(BackoffKind::Exponential);
        assert_eq!(policy.delay_for(20), Duration::from_secs(5));
        // Large attempt numbers must not overflow.
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = policy(BackoffKind::Exponential);
        for attempt in 0..5 {
            let base = policy.delay_for(attempt);
            for _ in 0..50 {
                let jittered = policy.delay_with_jitter(attempt);
                assert!(jittered >= base);
                assert!(jittered <= base + base.mul_f64(0.25));
            }
        }
    }
}

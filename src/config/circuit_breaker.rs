use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Upper bound on a single guarded call.
    pub call_timeout: Duration,
    /// Failure rate (0..=1) over the rolling window that trips the breaker.
    pub error_threshold: f64,
    /// How long the breaker stays OPEN before admitting probes.
    pub reset_timeout: Duration,
    /// Minimum calls in the window before the rate is meaningful.
    pub volume_threshold: usize,
    /// Concurrent probes admitted while HALF_OPEN.
    pub half_open_max_probes: u32,
}

impl CircuitBreakerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(CircuitBreakerConfig {
            call_timeout: Duration::from_millis(
                env::var("CIRCUIT_BREAKER_TIMEOUT")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .unwrap_or(30_000),
            ),
            error_threshold: env::var("CIRCUIT_BREAKER_ERROR_THRESHOLD")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<f64>()
                .map(|pct| pct / 100.0)
                .unwrap_or(0.5),
            reset_timeout: Duration::from_millis(
                env::var("CIRCUIT_BREAKER_RESET_TIMEOUT")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .unwrap_or(30_000),
            ),
            volume_threshold: env::var("CIRCUIT_BREAKER_VOLUME_THRESHOLD")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            half_open_max_probes: env::var("CIRCUIT_BREAKER_HALF_OPEN_PROBES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        std::env::remove_var("CIRCUIT_BREAKER_ERROR_THRESHOLD");
        std::env::remove_var("CIRCUIT_BREAKER_VOLUME_THRESHOLD");
        let config = CircuitBreakerConfig::from_env().unwrap();
        assert!((config.error_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.volume_threshold, 10);
    }

    #[test]
    #[serial]
    fn threshold_is_read_as_percentage() {
        std::env::set_var("CIRCUIT_BREAKER_ERROR_THRESHOLD", "25");
        let config = CircuitBreakerConfig::from_env().unwrap();
        assert!((config.error_threshold - 0.25).abs() < f64::EPSILON);
        std::env::remove_var("CIRCUIT_BREAKER_ERROR_THRESHOLD");
    }
}

use anyhow::Result;
use std::env;
use std::time::Duration;

/// Backoff shape between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Exponential,
    Linear,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Consumer prefetch and the in-process worker parallelism bound.
    pub concurrency: u16,
    pub max_retries: i32,
    pub retry_delay: Duration,
    pub retry_backoff: BackoffKind,
    pub max_retry_delay: Duration,
}

impl QueueConfig {
    pub fn from_env() -> Result<Self> {
        let backoff = match env::var("QUEUE_RETRY_BACKOFF")
            .unwrap_or_else(|_| "exponential".to_string())
            .to_lowercase()
            .as_str()
        {
            "linear" => BackoffKind::Linear,
            _ => BackoffKind::Exponential,
        };

        Ok(QueueConfig {
            concurrency: env::var("QUEUE_CONCURRENCY")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            max_retries: env::var("QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_delay: Duration::from_millis(
                env::var("QUEUE_RETRY_DELAY")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
            ),
            retry_backoff: backoff,
            max_retry_delay: Duration::from_millis(
                env::var("QUEUE_MAX_RETRY_DELAY")
                    .unwrap_or_else(|_| "60000".to_string())
                    .parse()
                    .unwrap_or(60_000),
            ),
        })
    }
}

use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub url: String,
    /// Per-attempt upper bound on the HTTP call.
    pub timeout: Duration,
}

impl DeliveryConfig {
    pub fn from_env() -> Result<Self> {
        Ok(DeliveryConfig {
            url: env::var("EMAIL_SERVICE_URL")
                .map_err(|_| anyhow::anyhow!("EMAIL_SERVICE_URL must be set"))?,
            timeout: Duration::from_millis(
                env::var("EMAIL_SERVICE_TIMEOUT")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .unwrap_or(10_000),
            ),
        })
    }
}

use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(BrokerConfig {
            url: env::var("RABBITMQ_URL")
                .map_err(|_| anyhow::anyhow!("RABBITMQ_URL must be set"))?,
        })
    }
}

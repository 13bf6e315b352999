use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
    pub debug: bool,
    pub port: u16,
    /// Hard deadline for drain on shutdown, in seconds.
    pub shutdown_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            name: env::var("APP_NAME").unwrap_or_else(|_| "Heyday".to_string()),
            env: env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()),
            debug: env::var("APP_DEBUG")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            shutdown_timeout_seconds: env::var("SHUTDOWN_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn is_development(&self) -> bool {
        self.env == "local" || self.env == "development"
    }

    pub fn is_testing(&self) -> bool {
        self.env == "testing"
    }
}

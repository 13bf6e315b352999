use anyhow::Result;
use std::env;
use std::time::Duration;

/// Cron expressions are standard five-field, evaluated in UTC.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub daily: String,
    pub minute: String,
    pub recovery: String,
    /// Rows past their send time by more than this are considered missed.
    pub recovery_grace: Duration,
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self> {
        Ok(ScheduleConfig {
            daily: env::var("CRON_DAILY_SCHEDULE").unwrap_or_else(|_| "0 0 * * *".to_string()),
            minute: env::var("CRON_MINUTE_SCHEDULE").unwrap_or_else(|_| "* * * * *".to_string()),
            recovery: env::var("CRON_RECOVERY_SCHEDULE")
                .unwrap_or_else(|_| "*/10 * * * *".to_string()),
            recovery_grace: Duration::from_secs(
                env::var("RECOVERY_GRACE_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            ),
        })
    }
}

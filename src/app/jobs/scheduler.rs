use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PeriodicJob;
use crate::app::services::metrics::JOB_LAST_RUN;

pub type LastRuns = Arc<RwLock<HashMap<&'static str, DateTime<Utc>>>>;

/// Drives the periodic jobs on their cron schedules (UTC). Each job gets
/// its own loop task and an "already running" guard; a tick that outlives
/// its interval makes the next firing skip rather than overlap.
///
/// There is no cross-process coordination here: the jobs themselves are
/// idempotent (unique keys, status-guarded updates), so duplicate runs on
/// other hosts are safe.
pub struct JobScheduler {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    last_runs: LastRuns,
}

impl JobScheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        JobScheduler {
            shutdown,
            handles: Vec::new(),
            last_runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn last_runs(&self) -> LastRuns {
        self.last_runs.clone()
    }

    pub fn register(&mut self, job: Arc<dyn PeriodicJob>, expression: &str) -> Result<()> {
        let schedule = parse_cron(expression)
            .with_context(|| format!("invalid cron expression for job '{}'", job.name()))?;

        tracing::info!(job = job.name(), cron = expression, "Job registered");

        let handle = tokio::spawn(run_loop(
            job,
            schedule,
            self.shutdown.clone(),
            self.last_runs.clone(),
        ));
        self.handles.push(handle);

        Ok(())
    }

    /// Wait for every job loop to finish its current tick, bounded by
    /// `timeout`.
    pub async fn join(self, timeout: Duration) {
        let drain = futures::future::join_all(self.handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            tracing::warn!("Job loops did not drain before the shutdown deadline");
        }
    }
}

/// The `cron` crate wants a seconds field and accepts a year; standard
/// five-field expressions get "0" prepended and "*" appended.
fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    let full = format!("0 {} *", expression.trim());
    cron::Schedule::from_str(&full).map_err(Into::into)
}

async fn run_loop(
    job: Arc<dyn PeriodicJob>,
    schedule: cron::Schedule,
    shutdown: CancellationToken,
    last_runs: LastRuns,
) {
    let running = Arc::new(AtomicBool::new(false));

    loop {
        let now = Utc::now();
        let Some(next) = schedule.after(&now).next() else {
            tracing::warn!(job = job.name(), "Schedule produced no further firings");
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        if running.swap(true, Ordering::SeqCst) {
            tracing::warn!(job = job.name(), "Previous tick still running, skipping");
            continue;
        }

        let job = job.clone();
        let running = running.clone();
        let last_runs = last_runs.clone();
        tokio::spawn(async move {
            let fired_at = Utc::now();
            job.tick(fired_at).await;

            last_runs.write().await.insert(job.name(), Utc::now());
            metrics::gauge!(JOB_LAST_RUN, "job" => job.name())
                .set(Utc::now().timestamp() as f64);
            running.store(false, Ordering::SeqCst);
        });
    }

    tracing::info!(job = job.name(), "Job loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expressions_parse() {
        assert!(parse_cron("0 0 * * *").is_ok());
        assert!(parse_cron("* * * * *").is_ok());
        assert!(parse_cron("*/10 * * * *").is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_cron("not a cron").is_err());
        assert!(parse_cron("99 99 * * *").is_err());
    }

    #[test]
    fn daily_schedule_fires_at_midnight_utc() {
        let schedule = parse_cron("0 0 * * *").unwrap();
        let after = DateTime::parse_from_rfc3339("2026-05-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = schedule.after(&after).next().unwrap();
        assert_eq!(next.to_rfc3339(), "2026-05-16T00:00:00+00:00");
    }
}

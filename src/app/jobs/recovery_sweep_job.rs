use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::PeriodicJob;
use crate::app::models::message_log::MessageStatus;
use crate::app::queue::{JobEnvelope, Publisher};
use crate::app::services::message_log_service::MessageLogService;
use crate::app::services::metrics::{MESSAGES_MISSED, PUBLISH_FAILURES};
use crate::database::DbPool;

const BATCH_LIMIT: i64 = 100;

/// Reconciles the log with the broker after downtime or lost confirms.
/// Any non-terminal row past its send time by more than the grace period is
/// republished as-is; the workers' guarded transitions sort out whatever
/// state it is really in.
pub struct RecoverySweepJob {
    pool: DbPool,
    publisher: Arc<Publisher>,
    grace: StdDuration,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepStats {
    pub missed: u64,
    pub republished: u64,
    pub publish_failures: u64,
}

impl RecoverySweepJob {
    pub fn new(pool: DbPool, publisher: Arc<Publisher>, grace: StdDuration) -> Self {
        RecoverySweepJob {
            pool,
            publisher,
            grace,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let cutoff = now - Duration::from_std(self.grace).unwrap_or_else(|_| Duration::minutes(5));

        let missed = match MessageLogService::find_missed(
            &self.pool,
            cutoff,
            &[
                MessageStatus::Scheduled,
                MessageStatus::Queued,
                MessageStatus::Retrying,
            ],
            BATCH_LIMIT,
        ) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query missed rows");
                return stats;
            }
        };

        stats.missed = missed.len() as u64;

        for log in missed {
            let envelope = JobEnvelope::for_log(&log, now);
            match self.publisher.publish(&envelope).await {
                Ok(()) => {
                    stats.republished += 1;
                    tracing::info!(
                        message_id = %log.id,
                        status = %log.status,
                        scheduled_send_time = %log.scheduled_send_time,
                        "Republished missed row"
                    );
                }
                Err(e) => {
                    tracing::warn!(message_id = %log.id, error = %e, "Failed to republish missed row");
                    stats.publish_failures += 1;
                    metrics::counter!(PUBLISH_FAILURES).increment(1);
                }
            }
        }

        if stats.missed > 0 {
            metrics::counter!(MESSAGES_MISSED).increment(stats.missed);
            tracing::warn!(
                missed = stats.missed,
                republished = stats.republished,
                "Recovery sweep found past-due work"
            );
        }

        stats
    }
}

#[async_trait]
impl PeriodicJob for RecoverySweepJob {
    fn name(&self) -> &'static str {
        "recovery_sweep"
    }

    async fn tick(&self, now: DateTime<Utc>) {
        self.run(now).await;
    }
}

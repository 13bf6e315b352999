use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::PeriodicJob;
use crate::app::models::message_log::MessageStatus;
use crate::app::queue::{JobEnvelope, Publisher};
use crate::app::services::message_log_service::MessageLogService;
use crate::app::services::metrics::{MESSAGES_QUEUED, PUBLISH_FAILURES};
use crate::database::DbPool;

/// How far ahead of the send time a row may be queued. Workers do not gate
/// on the send time again; broker latency is assumed far below this margin.
const LOOKAHEAD_MINUTES: i64 = 60;
const BATCH_LIMIT: i64 = 100;

/// Minute job. Moves SCHEDULED rows whose send time is inside the
/// look-ahead window onto the broker. A row only becomes QUEUED after the
/// broker confirms the publish; anything unconfirmed stays SCHEDULED and is
/// picked up by the next tick (or, eventually, the recovery sweeper).
pub struct EnqueueJob {
    pool: DbPool,
    publisher: Arc<Publisher>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EnqueueStats {
    pub picked_up: u64,
    pub queued: u64,
    pub publish_failures: u64,
}

impl EnqueueJob {
    pub fn new(pool: DbPool, publisher: Arc<Publisher>) -> Self {
        EnqueueJob { pool, publisher }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> EnqueueStats {
        let mut stats = EnqueueStats::default();
        let window_end = now + Duration::minutes(LOOKAHEAD_MINUTES);

        let due = match MessageLogService::find_due_between(
            &self.pool,
            now,
            window_end,
            MessageStatus::Scheduled,
            BATCH_LIMIT,
        ) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due rows");
                return stats;
            }
        };

        stats.picked_up = due.len() as u64;

        for log in due {
            let envelope = JobEnvelope::for_log(&log, now);

            match self.publisher.publish(&envelope).await {
                Ok(()) => {
                    match MessageLogService::mark_status(
                        &self.pool,
                        &log.id,
                        &[MessageStatus::Scheduled],
                        MessageStatus::Queued,
                    ) {
                        Ok(true) => {
                            stats.queued += 1;
                            metrics::counter!(MESSAGES_QUEUED, "kind" => log.message_type.clone())
                                .increment(1);
                        }
                        Ok(false) => {
                            // Another process queued it between the query and
                            // the update; the duplicate publish is absorbed by
                            // the worker's SENT check.
                            tracing::debug!(message_id = %log.id, "Row already queued elsewhere");
                        }
                        Err(e) => {
                            tracing::error!(message_id = %log.id, error = %e, "Failed to mark QUEUED");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(message_id = %log.id, error = %e, "Publish not confirmed, leaving SCHEDULED");
                    stats.publish_failures += 1;
                    metrics::counter!(PUBLISH_FAILURES).increment(1);
                }
            }
        }

        if stats.picked_up > 0 {
            tracing::info!(
                picked_up = stats.picked_up,
                queued = stats.queued,
                publish_failures = stats.publish_failures,
                "Enqueue tick finished"
            );
        }

        stats
    }
}

#[async_trait]
impl PeriodicJob for EnqueueJob {
    fn name(&self) -> &'static str {
        "enqueue"
    }

    async fn tick(&self, now: DateTime<Utc>) {
        self.run(now).await;
    }
}

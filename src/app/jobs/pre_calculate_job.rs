use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use super::PeriodicJob;
use crate::app::models::message_log::NewMessageLog;
use crate::app::models::user::User;
use crate::app::services::idempotency::idempotency_key;
use crate::app::services::message_log_service::MessageLogService;
use crate::app::services::metrics::{MESSAGES_DUPLICATE, MESSAGES_SCHEDULED, VALIDATION_SKIPS};
use crate::app::services::timezone_service::TimezoneService;
use crate::app::services::user_service::UserService;
use crate::app::strategies::{MessageContext, MessageStrategy, StrategyRegistry};
use crate::database::DbPool;

/// Daily job. Walks every registered strategy over its candidate users and
/// inserts a SCHEDULED row for each occurrence that fires today in the
/// user's own zone. Because each user is judged through their own zone
/// projection, a single UTC-midnight run covers the full 26-hour civil day.
///
/// Re-running on the same day is safe and cheap: the idempotency key turns
/// every repeat into a counted duplicate.
pub struct PreCalculateJob {
    pool: DbPool,
    registry: Arc<StrategyRegistry>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PreCalcStats {
    pub candidates: u64,
    pub scheduled: u64,
    pub duplicates_skipped: u64,
    pub validation_skips: u64,
    pub errors: u64,
    pub scheduled_per_kind: HashMap<String, u64>,
}

enum ScheduleOutcome {
    Scheduled,
    Duplicate,
    NotDue,
    Invalid,
}

impl PreCalculateJob {
    pub fn new(pool: DbPool, registry: Arc<StrategyRegistry>) -> Self {
        PreCalculateJob { pool, registry }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> PreCalcStats {
        let mut stats = PreCalcStats::default();

        for strategy in self.registry.iter() {
            let kind = strategy.message_type();
            let field = strategy.schedule().trigger_field;

            let candidates = match UserService::find_with_trigger(&self.pool, field) {
                Ok(users) => users,
                Err(e) => {
                    tracing::error!(kind, error = %e, "Failed to enumerate candidates");
                    stats.errors += 1;
                    continue;
                }
            };

            stats.candidates += candidates.len() as u64;

            for user in &candidates {
                match self.schedule_user(strategy.as_ref(), user, now) {
                    Ok(ScheduleOutcome::Scheduled) => {
                        stats.scheduled += 1;
                        *stats
                            .scheduled_per_kind
                            .entry(kind.to_string())
                            .or_insert(0) += 1;
                        metrics::counter!(MESSAGES_SCHEDULED, "kind" => kind.to_string())
                            .increment(1);
                    }
                    Ok(ScheduleOutcome::Duplicate) => {
                        stats.duplicates_skipped += 1;
                        metrics::counter!(MESSAGES_DUPLICATE).increment(1);
                    }
                    Ok(ScheduleOutcome::NotDue) => {}
                    Ok(ScheduleOutcome::Invalid) => {
                        stats.validation_skips += 1;
                        metrics::counter!(VALIDATION_SKIPS).increment(1);
                    }
                    Err(e) => {
                        // One user's failure never aborts the sweep.
                        tracing::error!(kind, user_id = %user.id, error = %e, "Failed to schedule user");
                        stats.errors += 1;
                    }
                }
            }
        }

        tracing::info!(
            candidates = stats.candidates,
            scheduled = stats.scheduled,
            duplicates = stats.duplicates_skipped,
            validation_skips = stats.validation_skips,
            errors = stats.errors,
            "Pre-calculation finished"
        );

        stats
    }

    fn schedule_user(
        &self,
        strategy: &dyn MessageStrategy,
        user: &User,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ScheduleOutcome> {
        let Some(occurrence) = strategy.occurrence_for(user, now)? else {
            return Ok(ScheduleOutcome::NotDue);
        };

        let report = strategy.validate(user);
        for warning in &report.warnings {
            tracing::warn!(user_id = %user.id, kind = strategy.message_type(), warning = %warning, "Validation warning");
        }
        if !report.valid {
            tracing::info!(
                user_id = %user.id,
                kind = strategy.message_type(),
                errors = ?report.errors,
                "Skipping user that failed validation"
            );
            return Ok(ScheduleOutcome::Invalid);
        }

        let zone = TimezoneService::parse_zone(&user.timezone)?;
        let key = idempotency_key(&user.id, strategy.message_type(), occurrence, zone);
        let send_time = strategy.calculate_send_time(user, occurrence)?;
        let content = strategy.compose_message(
            user,
            &MessageContext {
                current_year: occurrence.year(),
                occurrence_date: occurrence,
                timezone: zone,
            },
        );

        let row = NewMessageLog::new(
            user.id,
            strategy.message_type().to_string(),
            content,
            send_time,
            key,
        );

        if MessageLogService::insert_if_absent(&self.pool, row)? {
            Ok(ScheduleOutcome::Scheduled)
        } else {
            Ok(ScheduleOutcome::Duplicate)
        }
    }
}

#[async_trait]
impl PeriodicJob for PreCalculateJob {
    fn name(&self) -> &'static str {
        "pre_calculate"
    }

    async fn tick(&self, now: DateTime<Utc>) {
        self.run(now).await;
    }
}

pub mod anniversary;
pub mod birthday;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::app::models::user::{TriggerField, User};
use crate::app::services::timezone_service::{TimezoneError, TimezoneService};

pub use anniversary::AnniversaryStrategy;
pub use birthday::BirthdayStrategy;

/// How often a trigger recurs. Both built-ins are yearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    Yearly,
}

/// A strategy's declared schedule: what drives it and when it sends,
/// expressed in the recipient's local wall clock.
#[derive(Debug, Clone)]
pub struct StrategySchedule {
    pub cadence: Cadence,
    pub trigger_field: TriggerField,
    pub send_hour: u32,
    pub send_minute: u32,
}

/// Inputs to message composition. Strategies never read the clock; the
/// caller supplies time through this context, which keeps composition pure.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub current_year: i32,
    pub occurrence_date: NaiveDate,
    pub timezone: Tz,
}

/// Pre-flight check result. Errors abort scheduling for the user; warnings
/// are logged and scheduling proceeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        ValidationReport {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no strategy registered for '{requested}'; known kinds: {}", known.join(", "))]
    NotRegistered {
        requested: String,
        known: Vec<String>,
    },
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
}

/// Per-kind logic: eligibility, send time, content, validation. New kinds
/// plug in through the registry without touching the pipeline.
pub trait MessageStrategy: Send + Sync + std::fmt::Debug {
    /// Tag stored on log rows and used as the broker routing-key suffix.
    /// Uppercase by convention; registry lookups are case-insensitive.
    fn message_type(&self) -> &'static str;

    fn schedule(&self) -> StrategySchedule;

    fn compose_message(&self, user: &User, context: &MessageContext) -> String;

    /// The occurrence date this event fires for at `now`, or None when it
    /// does not fire.
    ///
    /// The anchor's date-this-year counts as firing when it is "today"
    /// either in the user's zone or in UTC. The UTC view lets the daily
    /// 00:00 UTC run schedule ahead for zones still on the previous civil
    /// day; the zone view covers zones already past the UTC date. Both
    /// views realize the same occurrence date, so the idempotency key
    /// collapses them to a single row.
    fn occurrence_for(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<Option<NaiveDate>, StrategyError> {
        let Some(anchor) = user.trigger_date(self.schedule().trigger_field) else {
            return Ok(None);
        };
        let zone = TimezoneService::parse_zone(&user.timezone)?;

        if TimezoneService::occurs_today(anchor, zone, now) {
            return Ok(Some(TimezoneService::occurrence_date(zone, now)));
        }

        let utc_today = now.date_naive();
        if TimezoneService::realize_occurrence(anchor, utc_today.year()) == utc_today {
            return Ok(Some(utc_today));
        }

        Ok(None)
    }

    /// Whether this user's anchor fires at `now`.
    fn should_send(&self, user: &User, now: DateTime<Utc>) -> Result<bool, StrategyError> {
        Ok(self.occurrence_for(user, now)?.is_some())
    }

    /// The UTC instant for this kind's local send time on `occurrence_date`.
    fn calculate_send_time(
        &self,
        user: &User,
        occurrence_date: NaiveDate,
    ) -> Result<DateTime<Utc>, StrategyError> {
        let zone = TimezoneService::parse_zone(&user.timezone)?;
        let schedule = self.schedule();
        Ok(TimezoneService::local_send_instant(
            occurrence_date,
            zone,
            schedule.send_hour,
            schedule.send_minute,
        )?)
    }

    fn validate(&self, user: &User) -> ValidationReport {
        base_validation(user, self.schedule().trigger_field)
    }
}

/// Checks shared by every strategy; kind-specific `validate` overrides call
/// this first and append their own findings.
pub fn base_validation(user: &User, field: TriggerField) -> ValidationReport {
    let mut report = ValidationReport::ok();

    if user.is_deleted() {
        report.add_error("user is soft-deleted");
    }
    if TimezoneService::parse_zone(&user.timezone).is_err() {
        report.add_error(format!("invalid timezone '{}'", user.timezone));
    }
    if user.trigger_date(field).is_none() {
        report.add_error(format!("missing {}", field.column_name()));
    }
    if user.email.trim().is_empty() || !user.email.contains('@') {
        report.add_error(format!("invalid email '{}'", user.email));
    }
    if user.first_name.trim().is_empty() {
        report.add_warning("first name is empty");
    }

    report
}

/// Process-wide map from kind tag to strategy. Seeded at startup with the
/// built-ins; registration replaces, lookup is case-insensitive.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn MessageStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry {
            strategies: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BirthdayStrategy));
        registry.register(Arc::new(AnniversaryStrategy));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn MessageStrategy>) {
        let tag = strategy.message_type().to_uppercase();
        if self.strategies.insert(tag.clone(), strategy).is_some() {
            tracing::debug!(kind = %tag, "Replacing registered strategy");
        }
    }

    pub fn get(&self, tag: &str) -> Result<Arc<dyn MessageStrategy>, StrategyError> {
        self.strategies
            .get(&tag.to_uppercase())
            .cloned()
            .ok_or_else(|| StrategyError::NotRegistered {
                requested: tag.to_string(),
                known: self.known_types(),
            })
    }

    pub fn known_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.strategies.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MessageStrategy>> {
        self.strategies.values()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

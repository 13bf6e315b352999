use chrono::Datelike;
use crate::app::models::user::{TriggerField, User};
use super::{base_validation, Cadence, MessageContext, MessageStrategy, StrategySchedule, ValidationReport};

/// Yearly greeting on the user's work anniversary, 09:00 local. The anchor
/// year feeds the years-of-service count in the message body.
#[derive(Debug)]
pub struct AnniversaryStrategy;

impl MessageStrategy for AnniversaryStrategy {
    fn message_type(&self) -> &'static str {
        "ANNIVERSARY"
    }

    fn schedule(&self) -> StrategySchedule {
        StrategySchedule {
            cadence: Cadence::Yearly,
            trigger_field: TriggerField::AnniversaryDate,
            send_hour: 9,
            send_minute: 0,
        }
    }

    fn compose_message(&self, user: &User, context: &MessageContext) -> String {
        let years = user
            .anniversary_date
            .map(|anchor| context.current_year - anchor.year())
            .unwrap_or(0);
        let noun = if years == 1 { "year" } else { "years" };

        format!(
            "Hey, {} it's your work anniversary! {} {} with us!",
            user.full_name(),
            years,
            noun
        )
    }

    fn validate(&self, user: &User) -> ValidationReport {
        let mut report = base_validation(user, TriggerField::AnniversaryDate);

        if let Some(anchor) = user.anniversary_date {
            if anchor > chrono::Utc::now().date_naive() {
                report.add_warning(format!("anniversary date {} is in the future", anchor));
            }
        }

        report
    }
}

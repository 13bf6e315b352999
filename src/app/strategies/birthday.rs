use crate::app::models::user::{TriggerField, User};
use super::{Cadence, MessageContext, MessageStrategy, StrategySchedule};

/// Yearly greeting on the user's birthday, 09:00 local.
#[derive(Debug)]
pub struct BirthdayStrategy;

impl MessageStrategy for BirthdayStrategy {
    fn message_type(&self) -> &'static str {
        "BIRTHDAY"
    }

    fn schedule(&self) -> StrategySchedule {
        StrategySchedule {
            cadence: Cadence::Yearly,
            trigger_field: TriggerField::BirthdayDate,
            send_hour: 9,
            send_minute: 0,
        }
    }

    fn compose_message(&self, user: &User, _context: &MessageContext) -> String {
        format!("Hey, {} it's your birthday", user.full_name())
    }
}

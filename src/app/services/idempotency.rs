use chrono::NaiveDate;
use chrono_tz::Tz;
use crate::app::models::DieselUlid;

/// Deterministic key for one (user, kind, occurrence). The unique index on
/// `message_logs.idempotency_key` is what makes concurrent scheduling safe:
/// racing inserts collapse to a single row.
pub fn idempotency_key(
    user_id: &DieselUlid,
    message_type: &str,
    occurrence_date: NaiveDate,
    zone: Tz,
) -> String {
    format!(
        "{}:{}:{}:{}",
        user_id,
        message_type.to_uppercase(),
        occurrence_date.format("%Y-%m-%d"),
        zone.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    #[test]
    fn key_is_deterministic() {
        let user_id = DieselUlid::new();
        let date = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();
        let first = idempotency_key(&user_id, "BIRTHDAY", date, New_York);
        let second = idempotency_key(&user_id, "BIRTHDAY", date, New_York);
        assert_eq!(first, second);
    }

    #[test]
    fn key_uppercases_the_kind() {
        let user_id = DieselUlid::new();
        let date = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();
        let key = idempotency_key(&user_id, "birthday", date, New_York);
        assert_eq!(
            key,
            format!("{}:BIRTHDAY:2026-05-15:America/New_York", user_id)
        );
    }
}

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use heyday::app::models::user::{TriggerField, User};
use heyday::app::services::timezone_service::TimezoneService;
use heyday::app::strategies::{
    AnniversaryStrategy, BirthdayStrategy, Cadence, MessageContext, MessageStrategy,
    StrategyError, StrategyRegistry,
};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn alice() -> User {
    let mut user = User::new(
        "Alice".to_string(),
        "Johnson".to_string(),
        "alice@example.com".to_string(),
        "America/New_York".to_string(),
    );
    user.birthday_date = Some(date(1990, 5, 15));
    user
}

fn context(year: i32, occurrence: NaiveDate, zone: &str) -> MessageContext {
    MessageContext {
        current_year: year,
        occurrence_date: occurrence,
        timezone: TimezoneService::parse_zone(zone).unwrap(),
    }
}

#[test]
fn birthday_message_content() {
    let user = alice();
    let message = BirthdayStrategy.compose_message(
        &user,
        &context(2026, date(2026, 5, 15), "America/New_York"),
    );
    assert_eq!(message, "Hey, Alice Johnson it's your birthday");
}

#[test]
fn anniversary_counts_years_of_service() {
    let mut user = alice();
    user.anniversary_date = Some(date(2020, 2, 29));

    let message = AnniversaryStrategy.compose_message(
        &user,
        &context(2025, date(2025, 2, 28), "America/New_York"),
    );
    assert_eq!(
        message,
        "Hey, Alice Johnson it's your work anniversary! 5 years with us!"
    );
}

#[test]
fn anniversary_uses_singular_for_one_year() {
    let mut user = alice();
    user.anniversary_date = Some(date(2025, 6, 1));

    let message = AnniversaryStrategy.compose_message(
        &user,
        &context(2026, date(2026, 6, 1), "America/New_York"),
    );
    assert!(message.ends_with("1 year with us!"));
}

#[test]
fn birthday_send_time_is_nine_local() {
    let user = alice();
    let send_time = BirthdayStrategy
        .calculate_send_time(&user, date(2026, 5, 15))
        .unwrap();
    assert_eq!(send_time, utc("2026-05-15T13:00:00Z"));
}

#[test]
fn should_send_fires_on_the_users_local_day() {
    let mut user = alice();
    user.timezone = "Pacific/Kiritimati".to_string();
    user.birthday_date = Some(date(1995, 1, 1));

    assert!(BirthdayStrategy
        .should_send(&user, utc("2025-12-31T11:00:00Z"))
        .unwrap());
    assert!(!BirthdayStrategy
        .should_send(&user, utc("2025-12-31T09:00:00Z"))
        .unwrap());
}

#[test]
fn fires_on_the_utc_day_for_zones_still_behind() {
    // 00:05 UTC on May 15 is still May 14 in New York; the UTC view lets
    // the midnight run schedule the occurrence ahead of the local day.
    let user = alice();
    let now = utc("2026-05-15T00:05:00Z");

    assert!(BirthdayStrategy.should_send(&user, now).unwrap());
    assert_eq!(
        BirthdayStrategy.occurrence_for(&user, now).unwrap(),
        Some(date(2026, 5, 15))
    );
}

#[test]
fn both_views_realize_the_same_occurrence() {
    // A day later New York has reached May 15 locally while UTC has moved
    // on to May 16. Same occurrence date, so the same idempotency key.
    let user = alice();
    let occurrence = BirthdayStrategy
        .occurrence_for(&user, utc("2026-05-16T00:05:00Z"))
        .unwrap();
    assert_eq!(occurrence, Some(date(2026, 5, 15)));
}

#[test]
fn occurrence_lands_on_the_local_new_year_across_the_date_line() {
    let mut user = alice();
    user.timezone = "Pacific/Kiritimati".to_string();
    user.birthday_date = Some(date(1995, 1, 1));

    let occurrence = BirthdayStrategy
        .occurrence_for(&user, utc("2025-12-31T11:00:00Z"))
        .unwrap();
    assert_eq!(occurrence, Some(date(2026, 1, 1)));
}

#[test]
fn should_send_is_false_without_a_trigger_date() {
    let mut user = alice();
    user.birthday_date = None;
    assert!(!BirthdayStrategy
        .should_send(&user, utc("2026-05-15T00:05:00Z"))
        .unwrap());
}

#[test]
fn leap_day_anniversary_fires_on_feb_28() {
    let mut user = alice();
    user.timezone = "UTC".to_string();
    user.anniversary_date = Some(date(2020, 2, 29));

    assert!(AnniversaryStrategy
        .should_send(&user, utc("2025-02-28T00:05:00Z"))
        .unwrap());
}

#[test]
fn schedules_declare_yearly_cadence_at_nine() {
    for strategy in [
        &BirthdayStrategy as &dyn MessageStrategy,
        &AnniversaryStrategy as &dyn MessageStrategy,
    ] {
        let schedule = strategy.schedule();
        assert_eq!(schedule.cadence, Cadence::Yearly);
        assert_eq!((schedule.send_hour, schedule.send_minute), (9, 0));
    }
    assert_eq!(
        BirthdayStrategy.schedule().trigger_field,
        TriggerField::BirthdayDate
    );
    assert_eq!(
        AnniversaryStrategy.schedule().trigger_field,
        TriggerField::AnniversaryDate
    );
}

#[test]
fn registry_seeds_both_builtins() {
    let registry = StrategyRegistry::with_builtins();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.known_types(), vec!["ANNIVERSARY", "BIRTHDAY"]);
}

#[test]
fn registry_lookup_is_case_insensitive() {
    let registry = StrategyRegistry::with_builtins();
    assert_eq!(
        registry.get("birthday").unwrap().message_type(),
        "BIRTHDAY"
    );
    assert_eq!(
        registry.get("Anniversary").unwrap().message_type(),
        "ANNIVERSARY"
    );
}

#[test]
fn registry_reregistration_replaces() {
    let mut registry = StrategyRegistry::with_builtins();
    registry.register(Arc::new(BirthdayStrategy));
    assert_eq!(registry.len(), 2);
}

#[test]
fn unknown_kind_error_lists_known_kinds() {
    let registry = StrategyRegistry::with_builtins();
    let err = registry.get("GRADUATION").unwrap_err();
    match err {
        StrategyError::NotRegistered { requested, known } => {
            assert_eq!(requested, "GRADUATION");
            assert_eq!(known, vec!["ANNIVERSARY", "BIRTHDAY"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn validation_rejects_bad_zone_and_missing_trigger() {
    let mut user = alice();
    user.timezone = "Not/AZone".to_string();
    user.birthday_date = None;

    let report = BirthdayStrategy.validate(&user);
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 2);
}

#[test]
fn validation_rejects_unroutable_email() {
    let mut user = alice();
    user.email = "not-an-address".to_string();

    let report = BirthdayStrategy.validate(&user);
    assert!(!report.valid);
}

#[test]
fn validation_warns_on_empty_first_name_but_passes() {
    let mut user = alice();
    user.first_name = "".to_string();

    let report = BirthdayStrategy.validate(&user);
    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn validation_rejects_soft_deleted_users() {
    let mut user = alice();
    user.deleted_at = Some(Utc::now());

    let report = BirthdayStrategy.validate(&user);
    assert!(!report.valid);
}

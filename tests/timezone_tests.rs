use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use heyday::app::services::timezone_service::{TimezoneError, TimezoneService};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn zone(name: &str) -> Tz {
    TimezoneService::parse_zone(name).unwrap()
}

#[test]
fn nine_am_new_york_in_summer_is_13_utc() {
    let instant =
        TimezoneService::local_send_instant(date(2026, 5, 15), zone("America/New_York"), 9, 0)
            .unwrap();
    assert_eq!(instant, utc("2026-05-15T13:00:00Z"));
}

#[test]
fn nine_am_new_york_in_winter_is_14_utc() {
    let instant =
        TimezoneService::local_send_instant(date(2026, 1, 15), zone("America/New_York"), 9, 0)
            .unwrap();
    assert_eq!(instant, utc("2026-01-15T14:00:00Z"));
}

#[test]
fn kiritimati_leads_utc_by_fourteen_hours() {
    // 09:00 on Jan 1 in UTC+14 is still Dec 31 in UTC.
    let instant =
        TimezoneService::local_send_instant(date(2026, 1, 1), zone("Pacific/Kiritimati"), 9, 0)
            .unwrap();
    assert_eq!(instant, utc("2025-12-31T19:00:00Z"));
}

#[test]
fn occurs_today_respects_the_zone_not_utc() {
    let anchor = date(2026, 1, 1);
    let kiritimati = zone("Pacific/Kiritimati");

    // 11:00 UTC on Dec 31 is already 01:00 on Jan 1 in Kiritimati.
    assert!(TimezoneService::occurs_today(
        anchor,
        kiritimati,
        utc("2025-12-31T11:00:00Z")
    ));
    // Two hours earlier it is still Dec 31 there.
    assert!(!TimezoneService::occurs_today(
        anchor,
        kiritimati,
        utc("2025-12-31T09:00:00Z")
    ));
}

#[test]
fn leap_day_anchor_observes_feb_28_in_common_years() {
    let anchor = date(2020, 2, 29);
    let utc_zone = zone("UTC");

    assert!(TimezoneService::occurs_today(
        anchor,
        utc_zone,
        utc("2025-02-28T10:00:00Z")
    ));
    assert!(!TimezoneService::occurs_today(
        anchor,
        utc_zone,
        utc("2025-03-01T10:00:00Z")
    ));
    // In a leap year the anchor fires on the 29th, not the 28th.
    assert!(TimezoneService::occurs_today(
        anchor,
        utc_zone,
        utc("2028-02-29T10:00:00Z")
    ));
    assert!(!TimezoneService::occurs_today(
        anchor,
        utc_zone,
        utc("2028-02-28T10:00:00Z")
    ));
}

#[test]
fn spring_forward_gap_resolves_to_next_valid_instant() {
    // 02:30 does not exist in New York on 2026-03-08; the clock jumps from
    // 02:00 EST to 03:00 EDT. The policy picks 03:00 EDT.
    let instant =
        TimezoneService::local_send_instant(date(2026, 3, 8), zone("America/New_York"), 2, 30)
            .unwrap();
    assert_eq!(instant, utc("2026-03-08T07:00:00Z"));
}

#[test]
fn fall_back_ambiguity_resolves_to_earliest() {
    // 01:30 happens twice in New York on 2026-11-01; the first pass is EDT.
    let instant =
        TimezoneService::local_send_instant(date(2026, 11, 1), zone("America/New_York"), 1, 30)
            .unwrap();
    assert_eq!(instant, utc("2026-11-01T05:30:00Z"));
}

#[test]
fn send_time_round_trips_through_the_zone() {
    let zones = [
        "America/New_York",
        "Europe/Berlin",
        "Asia/Tokyo",
        "Pacific/Kiritimati",
        "Pacific/Midway",
        "Asia/Kathmandu",
    ];
    let day = date(2026, 5, 15);

    for name in zones {
        let tz = zone(name);
        let instant = TimezoneService::local_send_instant(day, tz, 9, 0).unwrap();
        let local = instant.with_timezone(&tz);
        assert_eq!(local.date_naive(), day, "zone {}", name);
        assert_eq!((local.hour(), local.minute()), (9, 0), "zone {}", name);
    }
}

#[test]
fn unknown_zone_is_an_error() {
    let err = TimezoneService::parse_zone("Mars/Olympus_Mons").unwrap_err();
    assert_eq!(
        err,
        TimezoneError::InvalidZone("Mars/Olympus_Mons".to_string())
    );
}

#[test]
fn bad_time_of_day_is_an_error() {
    let err = TimezoneService::local_send_instant(date(2026, 5, 15), zone("UTC"), 25, 0)
        .unwrap_err();
    assert!(matches!(err, TimezoneError::InvalidDate(_)));
}

#[test]
fn realize_occurrence_maps_leap_day_to_feb_28() {
    let anchor = date(2020, 2, 29);
    assert_eq!(
        TimezoneService::realize_occurrence(anchor, 2025),
        date(2025, 2, 28)
    );
    assert_eq!(
        TimezoneService::realize_occurrence(anchor, 2028),
        date(2028, 2, 29)
    );
    assert_eq!(
        TimezoneService::realize_occurrence(date(1990, 5, 15), 2026),
        date(2026, 5, 15)
    );
}

#[test]
fn occurrence_date_projects_now_into_the_zone() {
    let now = utc("2026-05-15T02:00:00Z");
    assert_eq!(
        TimezoneService::occurrence_date(zone("America/New_York"), now),
        date(2026, 5, 14)
    );
    assert_eq!(
        TimezoneService::occurrence_date(zone("Asia/Tokyo"), now),
        date(2026, 5, 15)
    );
}

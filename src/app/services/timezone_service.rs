use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("invalid timezone: {0}")]
    InvalidZone(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Civil-time arithmetic. All persisted instants are UTC; this is the only
/// place wall-clock projections happen.
pub struct TimezoneService;

impl TimezoneService {
    pub fn parse_zone(name: &str) -> Result<Tz, TimezoneError> {
        Tz::from_str(name).map_err(|_| TimezoneError::InvalidZone(name.to_string()))
    }

    /// The UTC instant at which wall-clock `(hour, minute)` occurs on `date`
    /// in `zone`.
    ///
    /// A local time erased by a spring-forward transition resolves to the
    /// next valid local instant on that date; an ambiguous (fall-back) local
    /// time resolves to its earliest mapping.
    pub fn local_send_instant(
        date: NaiveDate,
        zone: Tz,
        hour: u32,
        minute: u32,
    ) -> Result<DateTime<Utc>, TimezoneError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            TimezoneError::InvalidDate(format!("{:02}:{:02} is not a time of day", hour, minute))
        })?;
        let mut local = date.and_time(time);

        // DST gaps are at most a few hours wide; walk forward a minute at a
        // time until the zone produces an instant.
        for _ in 0..=240 {
            if let Some(resolved) = zone.from_local_datetime(&local).earliest() {
                return Ok(resolved.with_timezone(&Utc));
            }
            local += Duration::minutes(1);
        }

        Err(TimezoneError::InvalidDate(format!(
            "{} has no valid instant in {}",
            date, zone
        )))
    }

    /// Today's calendar date as seen from `zone` at instant `now`.
    pub fn occurrence_date(zone: Tz, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&zone).date_naive()
    }

    /// Whether `anchor` recurs today when viewed from `zone` at `now`.
    ///
    /// A Feb 29 anchor is observed on Feb 28 in non-leap years.
    pub fn occurs_today(anchor: NaiveDate, zone: Tz, now: DateTime<Utc>) -> bool {
        let today = Self::occurrence_date(zone, now);
        let (month, day) = Self::observed_month_day(anchor, today.year());
        (today.month(), today.day()) == (month, day)
    }

    /// The date on which `anchor` is observed in `year`: same month and
    /// day, with Feb 29 falling back to Feb 28 in common years.
    pub fn realize_occurrence(anchor: NaiveDate, year: i32) -> NaiveDate {
        let (month, day) = Self::observed_month_day(anchor, year);
        // observed_month_day never yields a (month, day) invalid for `year`.
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(anchor)
    }

    fn observed_month_day(anchor: NaiveDate, year: i32) -> (u32, u32) {
        if anchor.month() == 2 && anchor.day() == 29 && !Self::is_leap_year(year) {
            (2, 28)
        } else {
            (anchor.month(), anchor.day())
        }
    }

    fn is_leap_year(year: i32) -> bool {
        NaiveDate::from_ymd_opt(year, 2, 29).is_some()
    }
}

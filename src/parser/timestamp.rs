//! Timestamp parsing for tooltip dates
//!
//! Facebook renders post times as `"Monday, June 24, 2013 at 5:20 PM"`. The
//! page gives no timezone, so the instant is built by substituting the fields
//! into an ISO-8601 shape and tagging it `Z`. No conversion happens.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TIMESTAMP_REGEX: Regex = Regex::new(
        r"(?i)^\s*[a-z]+,\s*(?P<month>[a-z]+)\s+(?P<day>\d{1,2}),\s*(?P<year>\d{4})\s+at\s+(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<meridiem>[ap]\.?m\.?)\s*$"
    )
    .expect("Invalid timestamp regex");

    /// English month names, full and abbreviated, to two-digit numbers
    static ref MONTHS: HashMap<&'static str, &'static str> = {
        const NAMES: [(&str, &str, &str); 12] = [
            ("january", "jan", "01"),
            ("february", "feb", "02"),
            ("march", "mar", "03"),
            ("april", "apr", "04"),
            ("may", "may", "05"),
            ("june", "jun", "06"),
            ("july", "jul", "07"),
            ("august", "aug", "08"),
            ("september", "sep", "09"),
            ("october", "oct", "10"),
            ("november", "nov", "11"),
            ("december", "dec", "12"),
        ];
        let mut map = HashMap::new();
        for (full, short, number) in NAMES {
            map.insert(full, number);
            map.insert(short, number);
        }
        map.insert("sept", "09");
        map
    };
}

struct Fields<'a> {
    year: &'a str,
    month: &'static str,
    day: u32,
    hour: u32,
    minute: &'a str,
    /// Literal "pm" marker
    pm: bool,
    /// Any afternoon marker, dotted forms included
    afternoon: bool,
}

fn extract(text: &str) -> Option<Fields<'_>> {
    let caps = TIMESTAMP_REGEX.captures(text)?;
    let meridiem = caps.name("meridiem")?.as_str().to_lowercase();
    let month = MONTHS
        .get(caps.name("month")?.as_str().to_lowercase().as_str())
        .copied()?;
    Some(Fields {
        year: caps.name("year")?.as_str(),
        month,
        day: caps.name("day")?.as_str().parse().ok()?,
        hour: caps.name("hour")?.as_str().parse().ok()?,
        minute: caps.name("minute")?.as_str(),
        pm: meridiem.contains("pm"),
        afternoon: meridiem.starts_with('p'),
    })
}

/// Parse a tooltip date into an ISO-8601 string by literal substitution
///
/// `PM` adds 12 to the hour with no special case for 12 o'clock, so
/// `12:30 PM` yields hour `24` and `12:30 AM` stays `12`. The hour is not
/// zero-padded. Use [`parse_timestamp_strict`] when a valid instant matters.
///
/// # Examples
///
/// ```
/// use fbmedia::parser::timestamp::parse_timestamp;
///
/// assert_eq!(
///     parse_timestamp("Monday, June 24, 2013 at 5:20 PM").as_deref(),
///     Some("2013-06-24T17:20:00Z")
/// );
/// assert_eq!(
///     parse_timestamp("Tuesday, January 1, 2020 at 9:05 AM").as_deref(),
///     Some("2020-01-01T9:05:00Z")
/// );
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(text: &str) -> Option<String> {
    let f = extract(text)?;
    let hour = if f.pm { f.hour + 12 } else { f.hour };
    Some(format!(
        "{}-{}-{:02}T{}:{}:00Z",
        f.year, f.month, f.day, hour, f.minute
    ))
}

/// Parse a tooltip date into a validated UTC instant
///
/// Uses the usual 12-hour clock rules (12 AM is midnight, 12 PM is noon) and
/// rejects impossible dates.
pub fn parse_timestamp_strict(text: &str) -> Option<DateTime<Utc>> {
    let f = extract(text)?;
    if f.hour == 0 || f.hour > 12 {
        return None;
    }
    let hour = match (f.hour, f.afternoon) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    let date = NaiveDate::from_ymd_opt(
        f.year.parse().ok()?,
        f.month.parse().ok()?,
        f.day,
    )?;
    let naive = date.and_hms_opt(hour, f.minute.parse().ok()?, 0)?;
    Some(naive.and_utc())
}

/// ISO-8601 string for a Unix timestamp from embedded page data
pub fn unix_to_iso(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_unix_to_iso() {
        assert_eq!(unix_to_iso(1_372_094_400).as_deref(), Some("2013-06-24T17:20:00Z"));
    }

    #[test]
    fn test_afternoon() {
        assert_eq!(
            parse_timestamp("Monday, June 24, 2013 at 5:20 PM").as_deref(),
            Some("2013-06-24T17:20:00Z")
        );
    }

    #[test]
    fn test_morning_hour_unpadded() {
        assert_eq!(
            parse_timestamp("Tuesday, January 1, 2020 at 9:05 AM").as_deref(),
            Some("2020-01-01T9:05:00Z")
        );
    }

    #[test]
    fn test_abbreviated_month_and_case() {
        assert_eq!(
            parse_timestamp("friday, SEP 3, 2021 at 11:45 pm").as_deref(),
            Some("2021-09-03T23:45:00Z")
        );
    }

    #[test]
    fn test_twelve_oclock_literal() {
        assert_eq!(
            parse_timestamp("Sunday, March 5, 2023 at 12:10 PM").as_deref(),
            Some("2023-03-05T24:10:00Z")
        );
        assert_eq!(
            parse_timestamp("Sunday, March 5, 2023 at 12:10 AM").as_deref(),
            Some("2023-03-05T12:10:00Z")
        );
    }

    #[test]
    fn test_only_literal_pm_shifts_hour() {
        assert_eq!(
            parse_timestamp("Monday, June 24, 2013 at 5:20 pm").as_deref(),
            Some("2013-06-24T17:20:00Z")
        );
        assert_eq!(
            parse_timestamp("Monday, June 24, 2013 at 5:20 p.m.").as_deref(),
            Some("2013-06-24T5:20:00Z")
        );
        let strict = parse_timestamp_strict("Monday, June 24, 2013 at 5:20 p.m.").unwrap();
        assert_eq!(strict.to_rfc3339(), "2013-06-24T17:20:00+00:00");
    }

    #[test]
    fn test_no_match() {
        assert!(parse_timestamp("2 hrs").is_none());
        assert!(parse_timestamp("Monday, Smarch 24, 2013 at 5:20 PM").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_strict_twelve_oclock() {
        let noon = parse_timestamp_strict("Sunday, March 5, 2023 at 12:10 PM").unwrap();
        assert_eq!(noon.hour(), 12);

        let midnight = parse_timestamp_strict("Sunday, March 5, 2023 at 12:10 AM").unwrap();
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.day(), 5);
    }

    #[test]
    fn test_strict_rejects_impossible_dates() {
        assert!(parse_timestamp_strict("Monday, February 30, 2023 at 1:00 PM").is_none());
        assert!(parse_timestamp_strict("Monday, June 24, 2013 at 13:00 PM").is_none());
    }

    #[test]
    fn test_strict_matches_literal_for_ordinary_hours() {
        let text = "Monday, June 24, 2013 at 5:20 PM";
        let strict = parse_timestamp_strict(text).unwrap();
        assert_eq!(
            strict.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            parse_timestamp(text).unwrap()
        );
    }
}

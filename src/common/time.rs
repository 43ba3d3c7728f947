//! Business-local time formatting and parsing. Stored timestamps are always
//! UTC; the booking-system payloads and the messages we render are both in
//! the salon's local zone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use chrono_tz::Tz;

pub const BUSINESS_TZ: Tz = Berlin;

/// Parses a timestamp from an upstream payload, accepting either an
/// RFC 3339 string (with offset) or a naive `"%Y-%m-%d %H:%M:%S"` string
/// interpreted in the business timezone.
pub fn parse_upstream_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    match BUSINESS_TZ.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::None => None,
    }
}

pub fn format_local_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&BUSINESS_TZ).format("%d.%m.%Y").to_string()
}

pub fn format_local_time(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&BUSINESS_TZ).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_upstream_datetime("2026-03-03T10:00:00+01:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_local_datetime() {
        let dt = parse_upstream_datetime("2026-03-03 10:00:00").unwrap();
        let formatted = format_local_time(dt);
        assert_eq!(formatted, "10:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_upstream_datetime("not a date").is_none());
    }

    #[test]
    fn formats_date_as_day_month_year() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        assert_eq!(format_local_date(dt), "03.03.2026");
    }
}

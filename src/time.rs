use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Locale hints for timestamps that carry no zone or an ambiguous day/month order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TimestampHints {
    pub dayfirst: bool,
    pub tz: Tz,
}

impl Default for TimestampHints {
    fn default() -> Self {
        Self {
            dayfirst: false,
            tz: chrono_tz::UTC,
        }
    }
}

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y, %I:%M:%S %p",
    "%m-%d-%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y"];

pub(crate) fn from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses the date and time formats found in exports into a UTC instant.
///
/// Strings with an explicit offset are taken as is, plain integers are
/// seconds since the Unix epoch, and anything else is read in `hints.tz`.
pub(crate) fn parse_timestamp(raw: &str, hints: &TimestampHints) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<i64>() {
        return from_epoch(seconds);
    }

    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_time.with_timezone(&Utc));
    }
    if let Ok(date_time) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(date_time.with_timezone(&Utc));
    }

    let locale_formats = if hints.dayfirst {
        DAY_FIRST_FORMATS.iter().chain(MONTH_FIRST_FORMATS)
    } else {
        MONTH_FIRST_FORMATS.iter().chain(DAY_FIRST_FORMATS)
    };
    for format in ISO_FORMATS.iter().chain(locale_formats) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return localize(naive, hints.tz);
        }
    }

    let mut date_formats: Vec<&str> = DATE_FORMATS.to_vec();
    if !hints.dayfirst {
        date_formats.swap(1, 2);
    }
    date_formats
        .into_iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| localize(date.and_time(NaiveTime::MIN), hints.tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn kraken_ledger_time() {
        let ts = parse_timestamp("2024-01-15 10:30:45.1234", &TimestampHints::default()).unwrap();
        assert_eq!(ts.with_nanosecond(0).unwrap(), utc(2024, 1, 15, 10, 30, 45));
        assert_eq!(ts.nanosecond(), 123_400_000);
    }

    #[test]
    fn rfc3339_keeps_offset() {
        let ts = parse_timestamp("2021-03-01T10:00:00+02:00", &TimestampHints::default());
        assert_eq!(ts, Some(utc(2021, 3, 1, 8, 0, 0)));
    }

    #[test]
    fn epoch_seconds() {
        let ts = parse_timestamp("1700000000", &TimestampHints::default());
        assert_eq!(ts, Some(utc(2023, 11, 14, 22, 13, 20)));
    }

    #[test]
    fn naive_time_uses_zone_hint() {
        let hints = TimestampHints {
            dayfirst: true,
            tz: chrono_tz::Europe::London,
        };
        // British Summer Time is one hour ahead of UTC
        let ts = parse_timestamp("01/07/2022 12:00:00", &hints);
        assert_eq!(ts, Some(utc(2022, 7, 1, 11, 0, 0)));
    }

    #[test]
    fn dayfirst_changes_ambiguous_dates() {
        let month_first = parse_timestamp("02/03/2022 00:00:00", &TimestampHints::default());
        assert_eq!(month_first, Some(utc(2022, 2, 3, 0, 0, 0)));

        let hints = TimestampHints {
            dayfirst: true,
            ..Default::default()
        };
        let day_first = parse_timestamp("02/03/2022 00:00:00", &hints);
        assert_eq!(day_first, Some(utc(2022, 3, 2, 0, 0, 0)));
    }

    #[test]
    fn date_only() {
        assert_eq!(
            parse_timestamp("2020-12-31", &TimestampHints::default()),
            Some(utc(2020, 12, 31, 0, 0, 0))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_timestamp("yesterday", &TimestampHints::default()), None);
        assert_eq!(parse_timestamp("", &TimestampHints::default()), None);
    }
}

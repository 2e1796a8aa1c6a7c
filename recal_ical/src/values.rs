use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::ValueError;

/// A point in time as iCalendar knows it.
///
/// Source data freely mixes all three shapes, even within one series. Any
/// arithmetic or comparison across shapes has to lift them to a common
/// variant first; that algebra lives with the consumer of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Time {
    /// A DATE value, year/month/day only.
    Date(NaiveDate),
    /// A DATE-TIME without a time zone.
    Floating(NaiveDateTime),
    /// A DATE-TIME pinned to a time zone (UTC or an Olson zone).
    Zoned(DateTime<Tz>),
}

impl Time {
    pub fn is_date(&self) -> bool {
        matches!(self, Time::Date(_))
    }

    pub fn is_datetime(&self) -> bool {
        !self.is_date()
    }

    pub fn tz(&self) -> Option<Tz> {
        match self {
            Time::Zoned(dt) => Some(dt.timezone()),
            _ => None,
        }
    }

    /// The calendar date of this value, in its own time zone.
    pub fn date(&self) -> NaiveDate {
        match self {
            Time::Date(date) => *date,
            Time::Floating(dt) => dt.date(),
            Time::Zoned(dt) => dt.naive_local().date(),
        }
    }

    /// The wall-clock reading, with dates at midnight.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            Time::Date(date) => midnight(*date),
            Time::Floating(dt) => *dt,
            Time::Zoned(dt) => dt.naive_local(),
        }
    }

    /// The UTC reading for zoned values, the wall clock otherwise.
    pub fn utc_naive(&self) -> NaiveDateTime {
        match self {
            Time::Zoned(dt) => dt.naive_utc(),
            other => other.naive(),
        }
    }
}

/// The second half of a PERIOD value: an explicit end or a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodEnd {
    End(Time),
    Duration(chrono::Duration),
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Resolve a wall-clock reading in a time zone.
///
/// Ambiguous readings (clocks rolled back) map to their earliest instant.
/// Readings inside a DST gap are shifted forward out of the gap.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(first, _) => first,
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(first, _) => first,
                LocalResult::None => Utc.from_utc_datetime(&naive).with_timezone(&tz),
            }
        }
    }
}

/// Decode a DATE or DATE-TIME property value.
///
/// `tzid` is the TZID parameter if one was present, `force_date` reflects
/// `VALUE=DATE`. A trailing `Z` wins over any TZID.
pub fn parse_date_time_value(
    value: &str,
    tzid: Option<&str>,
    force_date: bool,
) -> Result<Time, ValueError> {
    let raw = value.trim();
    let bad = || ValueError::BadDateTime {
        value: value.to_string(),
    };

    let looks_like_date = raw.len() == 8 && raw.bytes().all(|byte| byte.is_ascii_digit());
    if force_date || looks_like_date {
        let digits = if raw.len() >= 8 { &raw[..8] } else { raw };
        return NaiveDate::parse_from_str(digits, "%Y%m%d")
            .map(Time::Date)
            .map_err(|_| bad());
    }

    if let Some(body) = raw.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(body, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        return Ok(Time::Zoned(Tz::UTC.from_utc_datetime(&naive)));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
    match tzid {
        Some(tzid) => {
            let tz: Tz = tzid.parse().map_err(|_| ValueError::UnknownTimeZone {
                tzid: tzid.to_string(),
            })?;
            Ok(Time::Zoned(localize(tz, naive)))
        }
        None => Ok(Time::Floating(naive)),
    }
}

/// Decode a DURATION value such as `PT30M`, `-P1DT12H` or `P7W`.
pub fn parse_duration_value(value: &str) -> Result<chrono::Duration, ValueError> {
    let raw = value.trim();
    let bad = || ValueError::BadDuration {
        value: value.to_string(),
    };

    let (negative, body) = match raw.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let parsed = iso8601::duration(body).map_err(|_| bad())?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = chrono::Duration::from_std(std_duration).map_err(|_| bad())?;

    Ok(if negative { -duration } else { duration })
}

/// Decode a PERIOD value, `start/end` or `start/duration`.
pub fn parse_period_value(value: &str, tzid: Option<&str>) -> Result<(Time, PeriodEnd), ValueError> {
    let raw = value.trim();
    let Some((first, second)) = raw.split_once('/') else {
        return Err(ValueError::BadPeriod {
            value: value.to_string(),
        });
    };

    let start = parse_date_time_value(first, tzid, false)?;
    let trimmed = second.trim();
    let end = if trimmed.starts_with('P')
        || trimmed.starts_with("+P")
        || trimmed.starts_with("-P")
    {
        PeriodEnd::Duration(parse_duration_value(trimmed)?)
    } else {
        PeriodEnd::End(parse_date_time_value(trimmed, tzid, false)?)
    };

    Ok((start, end))
}

pub fn parse_integer_value(value: &str) -> Result<i64, ValueError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ValueError::BadInteger {
            value: value.to_string(),
        })
}

/// Render the value portion of a DATE or DATE-TIME property.
///
/// Zoned values in a named zone render their wall clock; the TZID parameter
/// carries the zone and is the caller's concern.
pub fn render_date_time_value(time: &Time) -> String {
    match time {
        Time::Date(date) => date.format("%Y%m%d").to_string(),
        Time::Floating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
        Time::Zoned(dt) => {
            if dt.timezone() == Tz::UTC {
                dt.naive_utc().format("%Y%m%dT%H%M%SZ").to_string()
            } else {
                dt.naive_local().format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }
}

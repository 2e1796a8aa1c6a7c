use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use lazy_static::lazy_static;

use recal_ical::{localize, midnight, Time};

use crate::errors::Error;

lazy_static! {
    /// The earliest date the expansion will touch.
    pub static ref DATE_MIN: NaiveDate =
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    /// The latest date the expansion will touch.
    pub static ref DATE_MAX: NaiveDate =
        NaiveDate::from_ymd_opt(2038, 1, 1).unwrap_or(NaiveDate::MAX);
}

/// The UTC-normalized identity of one slot in a recurrence pattern.
pub type RecurrenceId = NaiveDateTime;

/// Convert a value to a datetime shape in the given zone.
///
/// Dates become midnight. Floating values pick up the zone if one is given.
/// Zoned values drop to their wall clock when no zone is given and keep their
/// own zone otherwise.
pub fn convert_to_datetime(time: Time, tz: Option<Tz>) -> Time {
    match (time, tz) {
        (Time::Date(date), None) => Time::Floating(midnight(date)),
        (Time::Date(date), Some(tz)) => Time::Zoned(localize(tz, midnight(date))),
        (Time::Floating(dt), Some(tz)) => Time::Zoned(localize(tz, dt)),
        (floating @ Time::Floating(_), None) => floating,
        (Time::Zoned(dt), None) => Time::Floating(dt.naive_local()),
        (zoned @ Time::Zoned(_), Some(_)) => zoned,
    }
}

/// Lift a set of values to a common variant so they can be compared.
///
/// All dates stay dates. Otherwise everything becomes a datetime, zoned by
/// the first zone found among the values (scanning in argument order).
pub fn make_comparable(times: &[Time]) -> Vec<Time> {
    let mut tz = None;
    let mut all_dates = true;
    for time in times {
        if !time.is_date() {
            all_dates = false;
            if let Some(found) = time.tz() {
                tz = Some(found);
                break;
            }
        }
    }
    if all_dates {
        return times.to_vec();
    }
    times
        .iter()
        .map(|time| convert_to_datetime(*time, tz))
        .collect()
}

/// Compare two already-lifted values.
fn lifted_cmp(a: &Time, b: &Time) -> Ordering {
    match (a, b) {
        (Time::Date(x), Time::Date(y)) => x.cmp(y),
        (Time::Floating(x), Time::Floating(y)) => x.cmp(y),
        (Time::Zoned(x), Time::Zoned(y)) => x.cmp(y),
        _ => a.utc_naive().cmp(&b.utc_naive()),
    }
}

/// Total order over heterogeneous values, lifting them first.
pub fn cmp_times(a: &Time, b: &Time) -> Ordering {
    let lifted = make_comparable(&[*a, *b]);
    lifted_cmp(&lifted[0], &lifted[1])
}

pub fn compare_greater(a: &Time, b: &Time) -> bool {
    cmp_times(a, b) == Ordering::Greater
}

/// Whether the event `[event_start, event_stop)` falls into the span
/// `[span_start, span_stop)`. Starts are inclusive, stops exclusive; a
/// zero-length event or span collapses to a point-containment check.
pub fn time_span_contains_event(
    span_start: &Time,
    span_stop: &Time,
    event_start: &Time,
    event_stop: &Time,
) -> Result<bool, Error> {
    let lifted = make_comparable(&[*span_start, *span_stop, *event_start, *event_stop]);
    let (ss, sp, es, ep) = (&lifted[0], &lifted[1], &lifted[2], &lifted[3]);

    if lifted_cmp(es, ep) == Ordering::Greater {
        return Err(Error::PeriodEndBeforeStart {
            start: *event_start,
            end: *event_stop,
        });
    }
    if lifted_cmp(ss, sp) == Ordering::Greater {
        return Err(Error::PeriodEndBeforeStart {
            start: *span_start,
            end: *span_stop,
        });
    }

    if lifted_cmp(es, ep) == Ordering::Equal {
        if lifted_cmp(ss, sp) == Ordering::Equal {
            return Ok(lifted_cmp(es, ss) == Ordering::Equal);
        }
        return Ok(
            lifted_cmp(ss, es) != Ordering::Greater && lifted_cmp(es, sp) == Ordering::Less
        );
    }
    if lifted_cmp(ss, sp) == Ordering::Equal {
        return Ok(
            lifted_cmp(es, ss) != Ordering::Greater && lifted_cmp(ss, ep) == Ordering::Less
        );
    }
    Ok(lifted_cmp(es, sp) == Ordering::Less && lifted_cmp(ss, ep) == Ordering::Less)
}

/// The identity forms of a time used to match modifications to pattern slots.
///
/// The first form identifies the slot (UTC for zoned values); the remaining
/// forms are lookup aliases (the local wall clock of a zoned value).
pub fn to_recurrence_ids(time: &Time) -> Vec<RecurrenceId> {
    match time {
        Time::Date(date) => vec![midnight(*date)],
        Time::Floating(dt) => vec![*dt],
        Time::Zoned(dt) => vec![dt.naive_utc(), dt.naive_local()],
    }
}

/// Add a duration, keeping the variant where possible.
///
/// A date plus a sub-day duration is promoted to a floating datetime so the
/// hour span survives. Zoned arithmetic is instant arithmetic; the UTC offset
/// of the result is re-resolved by the zone.
pub fn add_duration(time: &Time, duration: Duration) -> Time {
    match time {
        Time::Date(date) => {
            if duration == Duration::days(duration.num_days()) {
                Time::Date(*date + duration)
            } else {
                Time::Floating(midnight(*date) + duration)
            }
        }
        Time::Floating(dt) => Time::Floating(*dt + duration),
        Time::Zoned(dt) => Time::Zoned(*dt + duration),
    }
}

/// Like [`add_duration`] but `None` when the result leaves the representable range.
pub fn checked_add(time: &Time, duration: Duration) -> Option<Time> {
    match time {
        Time::Date(date) => {
            if duration == Duration::days(duration.num_days()) {
                date.checked_add_signed(duration).map(Time::Date)
            } else {
                midnight(*date)
                    .checked_add_signed(duration)
                    .map(Time::Floating)
            }
        }
        Time::Floating(dt) => dt.checked_add_signed(duration).map(Time::Floating),
        Time::Zoned(dt) => dt.checked_add_signed(duration).map(Time::Zoned),
    }
}

/// The difference `a - b` after lifting both to a common variant.
pub fn sub_times(a: &Time, b: &Time) -> Duration {
    let lifted = make_comparable(&[*a, *b]);
    match (&lifted[0], &lifted[1]) {
        (Time::Date(x), Time::Date(y)) => x.signed_duration_since(*y),
        (Time::Floating(x), Time::Floating(y)) => x.signed_duration_since(*y),
        (Time::Zoned(x), Time::Zoned(y)) => x.signed_duration_since(*y),
        _ => lifted[0].utc_naive().signed_duration_since(lifted[1].utc_naive()),
    }
}

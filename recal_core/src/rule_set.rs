use chrono::Duration;
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use recal_ical::{localize, parse_date_time_value, Time};

use crate::errors::Error;
use crate::time::{add_duration, cmp_times, compare_greater};

lazy_static! {
    /// `COUNT=-N` is a tombstone some producers emit; the engine rejects it.
    static ref NEGATIVE_COUNT: Regex =
        Regex::new(r"COUNT=-\d+;?").expect("the pattern is written out above");
    static ref UNTIL_VALUE: Regex =
        Regex::new(r"(?:^|;)UNTIL=([^;]*)").expect("the pattern is written out above");
}

/// One rule string handed to the engine, with its UNTIL remembered so
/// instances the engine produced past it can be clamped off again.
///
/// A rule whose UNTIL precedes the series start never reaches the engine;
/// it cannot produce anything.
#[derive(Debug)]
struct EngineRule {
    set: Option<rrule::RRuleSet>,
    until: Option<Time>,
}

/// The expandable pattern of a series: all its RRULEs plus explicit RDATEs,
/// anchored at the series start.
///
/// The engine is always anchored at a datetime. A zoned series runs in its
/// own zone; floating and date-only series run in UTC wall time and are
/// converted back on the way out.
#[derive(Debug)]
pub struct RecurrenceRuleSet {
    rules: Vec<EngineRule>,
    rdates: Vec<Time>,
    tz: Option<Tz>,
}

impl RecurrenceRuleSet {
    /// Build from rule strings anchored at `start`.
    ///
    /// `start` and `rdates` must already be lifted to the series' common
    /// variant. The series start joins the RDATEs unless an UNTIL precedes it.
    pub fn new(
        start: Time,
        tz: Option<Tz>,
        is_all_dates: bool,
        rule_strings: &[String],
        mut rdates: Vec<Time>,
    ) -> Result<RecurrenceRuleSet, Error> {
        let mut rules = Vec::new();
        let mut last_until: Option<Time> = None;

        for rule_string in rule_strings {
            let rule = create_rule_with_start(rule_string, &start, tz, is_all_dates)?;
            if let Some(until) = &rule.until {
                if last_until
                    .as_ref()
                    .map_or(true, |last| compare_greater(until, last))
                {
                    last_until = Some(*until);
                }
            }
            rules.push(rule);
        }

        let start_is_past_until = last_until
            .as_ref()
            .map_or(false, |until| compare_greater(&start, until));
        if !start_is_past_until {
            rdates.push(start);
        }

        Ok(RecurrenceRuleSet { rules, rdates, tz })
    }

    /// All pattern instances within `[span_start, span_stop]`, unordered and
    /// possibly with duplicates where an RDATE coincides with a rule
    /// instance.
    ///
    /// The window is padded by one hour on each side so a DST change
    /// straddling an edge cannot hide an instance; each zoned instance the
    /// engine yields is re-localized from its wall clock. Instances past a
    /// rule's UNTIL are dropped, RDATEs are not.
    pub fn between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Time>, Error> {
        let padded_start = add_duration(span_start, -Duration::hours(1));
        let padded_stop = add_duration(span_stop, Duration::hours(1));

        let mut found = Vec::new();
        for rule in &self.rules {
            let Some(set) = &rule.set else {
                continue;
            };
            for instance in set {
                let time = self.from_engine(instance);
                if compare_greater(&padded_start, &time) {
                    continue;
                }
                if compare_greater(&time, &padded_stop) {
                    break;
                }
                if let Some(until) = &rule.until {
                    if compare_greater(&time, until) {
                        continue;
                    }
                }
                found.push(time);
            }
        }

        for rdate in &self.rdates {
            if !compare_greater(&padded_start, rdate) && !compare_greater(rdate, &padded_stop) {
                found.push(*rdate);
            }
        }

        Ok(found)
    }

    fn from_engine(&self, instance: chrono::DateTime<rrule::Tz>) -> Time {
        match self.tz {
            Some(tz) => Time::Zoned(localize(tz, instance.naive_local())),
            None => Time::Floating(instance.naive_utc()),
        }
    }
}

/// The `DTSTART` content line anchoring the engine.
fn dtstart_line(start: &Time, tz: Option<Tz>) -> String {
    match (start, tz) {
        (Time::Zoned(dt), _) if dt.timezone() != Tz::UTC => format!(
            "DTSTART;TZID={}:{}",
            dt.timezone().name(),
            dt.naive_local().format("%Y%m%dT%H%M%S")
        ),
        (Time::Zoned(dt), _) => format!("DTSTART:{}Z", dt.naive_utc().format("%Y%m%dT%H%M%S")),
        (other, _) => format!("DTSTART:{}Z", other.naive().format("%Y%m%dT%H%M%S")),
    }
}

/// Parse one rule string, rewriting its UNTIL once if the engine rejects it.
fn create_rule_with_start(
    rule_string: &str,
    start: &Time,
    tz: Option<Tz>,
    is_all_dates: bool,
) -> Result<EngineRule, Error> {
    match parse_engine_rule(rule_string, start, tz) {
        Ok(rule) => Ok(rule),
        Err(first_error) => {
            let rewritten = rewrite_until(rule_string, tz, is_all_dates)?;
            debug!(
                original = rule_string,
                rewritten = rewritten.as_str(),
                "rewrote the UNTIL value of a rule the engine rejected"
            );
            parse_engine_rule(&rewritten, start, tz).map_err(|_| match first_error {
                error @ Error::BadRuleStringFormat { .. } => error,
                _ => Error::BadRuleStringFormat {
                    message: "the rule cannot be parsed".to_string(),
                    rule: rule_string.to_string(),
                },
            })
        }
    }
}

fn parse_engine_rule(rule_string: &str, start: &Time, tz: Option<Tz>) -> Result<EngineRule, Error> {
    let cleaned = NEGATIVE_COUNT
        .replace_all(rule_string.trim(), "")
        .trim_end_matches(';')
        .to_string();
    let until = extract_until(&cleaned)?;
    if let Some(until_value) = &until {
        if compare_greater(start, until_value) {
            return Ok(EngineRule { set: None, until });
        }
    }
    let block = format!("{}\nRRULE:{}", dtstart_line(start, tz), cleaned);
    let set = block
        .parse::<rrule::RRuleSet>()
        .map_err(|error| Error::BadRuleStringFormat {
            message: error.to_string(),
            rule: rule_string.to_string(),
        })?;
    Ok(EngineRule {
        set: Some(set),
        until,
    })
}

/// The UNTIL value of a rule string, decoded, or `None`.
fn extract_until(rule_string: &str) -> Result<Option<Time>, Error> {
    let mut values = UNTIL_VALUE.captures_iter(rule_string);
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(Error::BadRuleStringFormat {
            message: "there should be only one UNTIL".to_string(),
            rule: rule_string.to_string(),
        });
    }
    parse_date_time_value(&first[1], None, false)
        .map(Some)
        .map_err(|_| Error::BadRuleStringFormat {
            message: "UNTIL parameter has a bad format".to_string(),
            rule: rule_string.to_string(),
        })
}

/// Rewrite the UNTIL value so the engine accepts it.
///
/// A date-only series truncates UNTIL to its date. A floating series runs in
/// UTC wall time, so the value just needs its `Z`. A zoned series needs the
/// full 15-character `YYYYMMDDThhmmss` plus `Z`; shorter date values are
/// padded with midnight.
fn rewrite_until(rule_string: &str, tz: Option<Tz>, is_all_dates: bool) -> Result<String, Error> {
    let Some((head, tail)) = rule_string.split_once(";UNTIL=") else {
        return Err(Error::BadRuleStringFormat {
            message: "UNTIL parameter is missing".to_string(),
            rule: rule_string.to_string(),
        });
    };
    let value_end = tail.find(';').unwrap_or(tail.len());
    let mut until = tail[..value_end].to_string();
    let rest = &tail[value_end..];

    if is_all_dates {
        until.truncate(8);
        until.push_str("T000000Z");
    } else if tz.is_none() {
        if let Some(stripped) = until.strip_suffix('Z') {
            until = stripped.to_string();
        }
        if until.len() == 8 {
            until.push_str("T000000");
        }
        until.push('Z');
    } else {
        if until.len() == 8 {
            until.push_str("T000000");
        }
        if until.len() != 15 {
            return Err(Error::BadRuleStringFormat {
                message: "UNTIL parameter has a bad format".to_string(),
                rule: rule_string.to_string(),
            });
        }
        until.push('Z');
    }

    Ok(format!("{head}{rest};UNTIL={until}"))
}

/// Order pattern instances; useful in tests and debugging output.
#[allow(dead_code)]
pub fn sort_instances(mut instances: Vec<Time>) -> Vec<Time> {
    instances.sort_by(cmp_times);
    instances
}

#[cfg(test)]
mod test {
    use super::*;

    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions_sorted::assert_eq;
    use recal_ical::midnight;

    fn floating(y: i32, m: u32, d: u32, h: u32) -> Time {
        Time::Floating(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
        )
    }

    fn build(start: Time, tz: Option<Tz>, rules: &[&str]) -> RecurrenceRuleSet {
        let rule_strings: Vec<String> = rules.iter().map(|rule| rule.to_string()).collect();
        RecurrenceRuleSet::new(start, tz, false, &rule_strings, Vec::new()).unwrap()
    }

    #[test]
    fn test_start_is_an_implicit_rdate() {
        let rule_set = build(floating(2020, 1, 1, 9), None, &[]);
        let found = sort_instances(
            rule_set
                .between(&floating(2020, 1, 1, 0), &floating(2020, 1, 2, 0))
                .unwrap(),
        );
        assert_eq!(found, vec![floating(2020, 1, 1, 9)]);
    }

    #[test]
    fn test_start_past_until_is_not_included() {
        let rule_set = build(
            floating(2020, 1, 10, 9),
            None,
            &["FREQ=DAILY;UNTIL=20200105T090000"],
        );
        let found = rule_set
            .between(&floating(2020, 1, 1, 0), &floating(2020, 2, 1, 0))
            .unwrap();
        assert_eq!(found, vec![]);
    }

    #[test]
    fn test_daily_rule_window() {
        let rule_set = build(floating(2020, 1, 1, 9), None, &["FREQ=DAILY;COUNT=10"]);
        let found = sort_instances(
            rule_set
                .between(&floating(2020, 1, 3, 0), &floating(2020, 1, 5, 0))
                .unwrap(),
        );
        assert_eq!(found, vec![floating(2020, 1, 3, 9), floating(2020, 1, 4, 9)]);
    }

    #[test]
    fn test_non_utc_until_on_a_zoned_series_is_rewritten() {
        let tz = chrono_tz::Europe::Berlin;
        let start = Time::Zoned(tz.with_ymd_and_hms(2019, 8, 1, 14, 0, 0).unwrap());
        let rule_strings = vec!["FREQ=WEEKLY;UNTIL=20191023;BYDAY=TH;WKST=SU".to_string()];
        let rule_set =
            RecurrenceRuleSet::new(start, Some(tz), false, &rule_strings, Vec::new()).unwrap();

        let lo = Time::Zoned(tz.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap());
        let hi = Time::Zoned(tz.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let mut found = rule_set.between(&lo, &hi).unwrap();
        found.sort_by(cmp_times);
        found.dedup();
        assert_eq!(found.len(), 12);
        assert_eq!(
            found[11],
            Time::Zoned(tz.with_ymd_and_hms(2019, 10, 17, 14, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_negative_count_is_stripped() {
        let rule_set = build(floating(2020, 1, 1, 9), None, &["FREQ=DAILY;COUNT=-3"]);
        let found = sort_instances(
            rule_set
                .between(&floating(2020, 1, 1, 0), &floating(2020, 1, 3, 0))
                .unwrap(),
        );
        // COUNT=-3 is dropped entirely, the rule keeps producing
        assert!(found.len() >= 2);
    }

    #[test]
    fn test_unparseable_rule_is_a_bad_rule_string() {
        let rule_strings = vec!["FREQ=NEVERISH".to_string()];
        let error = RecurrenceRuleSet::new(
            floating(2020, 1, 1, 9),
            None,
            false,
            &rule_strings,
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(error.kind(), crate::errors::ErrorKind::BadRuleStringFormat);
    }

    #[test]
    fn test_rewrite_until_pads_a_date_for_a_zoned_series() {
        let rewritten = rewrite_until(
            "FREQ=WEEKLY;UNTIL=20191023;BYDAY=TH",
            Some(chrono_tz::Europe::Berlin),
            false,
        )
        .unwrap();
        assert_eq!(rewritten, "FREQ=WEEKLY;BYDAY=TH;UNTIL=20191023T000000Z");
    }

    #[test]
    fn test_extract_until_reads_the_value() {
        let until = extract_until("FREQ=DAILY;UNTIL=20200105T090000Z").unwrap();
        assert_eq!(
            until,
            Some(Time::Zoned(
                Tz::UTC.with_ymd_and_hms(2020, 1, 5, 9, 0, 0).unwrap()
            ))
        );
        assert_eq!(extract_until("FREQ=DAILY").unwrap(), None);
        assert!(extract_until("UNTIL=20200101;UNTIL=20200102").is_err());
    }

    #[test]
    fn test_date_series_runs_on_midnights() {
        let start = Time::Floating(midnight(NaiveDate::from_ymd_opt(2019, 3, 4).unwrap()));
        let rule_strings = vec!["FREQ=DAILY".to_string()];
        let rule_set =
            RecurrenceRuleSet::new(start, None, true, &rule_strings, Vec::new()).unwrap();
        let found = sort_instances(
            rule_set
                .between(&floating(2019, 3, 4, 0), &floating(2019, 3, 6, 0))
                .unwrap(),
        );
        // duplicates (implicit rdate + rule instance) are the caller's to drop
        assert!(found.contains(&floating(2019, 3, 4, 0)));
        assert!(found.contains(&floating(2019, 3, 5, 0)));
    }
}

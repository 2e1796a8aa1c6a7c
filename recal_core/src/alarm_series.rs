use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;

use recal_ical::{Component, Time, ValueError};

use crate::adapter::Adapter;
use crate::errors::Error;
use crate::occurrence::Occurrence;
use crate::series::{OccurrenceSource, Series};
use crate::time::{add_duration, convert_to_datetime};

/// How often one TRIGGER fires: once plus REPEAT more times, DURATION apart.
fn trigger_repetitions(alarm: &Component) -> Result<(i64, Option<Duration>), Error> {
    let repeat = alarm
        .property("REPEAT")
        .map(|property| property.as_integer())
        .transpose()?
        .unwrap_or(0)
        .max(0);
    if repeat == 0 {
        return Ok((0, None));
    }
    let duration = alarm
        .property("DURATION")
        .ok_or_else(|| {
            Error::Value(ValueError::BadDuration {
                value: "a repeating alarm needs a DURATION".to_string(),
            })
        })?
        .as_duration()?;
    Ok((repeat, Some(duration)))
}

/// All alarms with absolute triggers, indexed by their firing instant.
///
/// One shared instance collects every (alarm, parent component) pair of a
/// selection; `between` is a range scan over the index.
#[derive(Debug, Default)]
pub struct AbsoluteAlarmSeries {
    times: BTreeMap<NaiveDateTime, Vec<Occurrence>>,
}

impl AbsoluteAlarmSeries {
    pub fn new() -> AbsoluteAlarmSeries {
        AbsoluteAlarmSeries::default()
    }

    /// Register an alarm and its parent; REPEAT expands into more instants.
    pub fn add(
        &mut self,
        alarm: &Component,
        parent: &Arc<Adapter>,
        sequence: i64,
    ) -> Result<(), Error> {
        let Some(trigger_property) = alarm.property("TRIGGER") else {
            return Ok(());
        };
        let mut trigger = trigger_property.as_date_time()?;
        let (repeat, duration) = trigger_repetitions(alarm)?;

        self.add_at(trigger, alarm, parent, sequence);
        if let Some(duration) = duration {
            for _ in 0..repeat {
                trigger = add_duration(&trigger, duration);
                self.add_at(trigger, alarm, parent, sequence);
            }
        }
        Ok(())
    }

    fn add_at(&mut self, trigger: Time, alarm: &Component, parent: &Arc<Adapter>, sequence: i64) {
        let parent_occurrence = Occurrence::from_adapter(parent, sequence);
        let occurrence = Occurrence::alarm(trigger, alarm.clone(), &parent_occurrence);
        self.times
            .entry(trigger.utc_naive())
            .or_default()
            .push(occurrence);
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl OccurrenceSource for AbsoluteAlarmSeries {
    fn between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Occurrence>, Error> {
        let lo = convert_to_datetime(*span_start, Some(Tz::UTC));
        let hi = convert_to_datetime(*span_stop, Some(Tz::UTC));

        let mut found = Vec::new();
        for occurrences in self.times.range(lo.utc_naive()..=hi.utc_naive()).map(|(_, v)| v) {
            for occurrence in occurrences {
                if occurrence.is_in_span(&lo, &hi)? {
                    found.push(occurrence.clone());
                }
            }
        }
        Ok(found)
    }
}

/// Alarms firing relative to the start or end of their parent series.
///
/// Each probe shifts the query span by one trigger offset, asks the parent
/// series for its occurrences there and fires the alarm against each parent
/// occurrence that still carries it.
#[derive(Debug)]
pub struct RelativeAlarmSeries {
    alarm: Component,
    series: Arc<Series>,
    offsets: Vec<Duration>,
    relative_to_end: bool,
}

impl RelativeAlarmSeries {
    pub fn new(
        alarm: Component,
        series: Arc<Series>,
        relative_to_end: bool,
    ) -> Result<RelativeAlarmSeries, Error> {
        let trigger = alarm
            .property("TRIGGER")
            .ok_or_else(|| {
                Error::Value(ValueError::BadDuration {
                    value: "an alarm needs a TRIGGER".to_string(),
                })
            })?
            .as_duration()?;
        let (repeat, duration) = trigger_repetitions(&alarm)?;

        let mut offsets = vec![trigger];
        if let Some(duration) = duration {
            let mut last = trigger;
            for _ in 0..repeat {
                last = last + duration;
                offsets.push(last);
            }
        }

        Ok(RelativeAlarmSeries {
            alarm,
            series,
            offsets,
            relative_to_end,
        })
    }
}

impl OccurrenceSource for RelativeAlarmSeries {
    fn between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Occurrence>, Error> {
        // The end of an occurrence is exclusive; probing for parents by end
        // needs the span opened up by one second.
        let span_start = if self.relative_to_end {
            add_duration(span_start, -Duration::seconds(1))
        } else {
            *span_start
        };

        let mut found = Vec::new();
        for offset in &self.offsets {
            let parent_lo = add_duration(&span_start, -*offset);
            let parent_hi = add_duration(span_stop, -*offset);
            for parent in self.series.between(&parent_lo, &parent_hi)? {
                if !parent.has_alarm(&self.alarm) {
                    continue;
                }
                let anchor = if self.relative_to_end {
                    parent.end
                } else {
                    parent.start
                };
                let trigger = add_duration(&anchor, *offset);
                let occurrence = Occurrence::alarm(trigger, self.alarm.clone(), &parent);
                if occurrence.is_in_span(&span_start, span_stop)? {
                    found.push(occurrence);
                }
            }
        }
        Ok(found)
    }
}

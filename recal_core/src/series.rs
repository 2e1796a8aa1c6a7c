use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::trace;

use recal_ical::{PeriodEnd, Time};

use crate::adapter::{Adapter, RDate};
use crate::errors::Error;
use crate::occurrence::Occurrence;
use crate::rule_set::RecurrenceRuleSet;
use crate::time::{
    add_duration, convert_to_datetime, sub_times, to_recurrence_ids, RecurrenceId,
};

/// Anything that can produce occurrences inside a span.
///
/// Implemented by [`Series`] and by the alarm series. The result does not
/// need to be ordered.
pub trait OccurrenceSource: fmt::Debug + Send + Sync {
    fn between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Occurrence>, Error>;
}

/// The expandable part of a series: the core component with its rules,
/// exclusions and period replacements, all lifted to one common variant.
#[derive(Debug)]
struct RecurrenceRules {
    core: Arc<Adapter>,
    original_start: Time,
    original_end: Time,
    tz: Option<Tz>,
    rule_set: RecurrenceRuleSet,
    check_exdates_datetime: HashSet<RecurrenceId>,
    check_exdates_date: HashSet<NaiveDate>,
    replace_ends: HashMap<RecurrenceId, Duration>,
}

impl RecurrenceRules {
    fn new(core: Arc<Adapter>) -> Result<RecurrenceRules, Error> {
        let original_start = core.start();
        let original_end = core.end();

        let mut check_exdates_datetime: HashSet<RecurrenceId> = HashSet::new();
        let mut check_exdates_date: HashSet<NaiveDate> = HashSet::new();
        for exdate in core.exdates() {
            check_exdates_datetime.extend(to_recurrence_ids(exdate));
            if exdate.is_date() {
                check_exdates_date.insert(exdate.date());
            }
        }

        let mut rdates: Vec<Time> = Vec::new();
        let mut replace_ends: HashMap<RecurrenceId, Duration> = HashMap::new();
        for rdate in core.rdates() {
            match rdate {
                RDate::At(time) => rdates.push(*time),
                RDate::Period(start, end) => {
                    rdates.push(*start);
                    let duration = match end {
                        PeriodEnd::Duration(duration) => *duration,
                        PeriodEnd::End(end) => sub_times(end, start),
                    };
                    for recurrence_id in to_recurrence_ids(start) {
                        replace_ends.insert(recurrence_id, duration);
                    }
                }
            }
        }

        // Pick the common variant: the first time zone wins, scanning the
        // start, the end, the exdates and the rdates in that order.
        let mut scan = vec![original_start, original_end];
        scan.extend(core.exdates().iter().copied());
        scan.extend(rdates.iter().copied());
        let is_all_dates = scan.iter().all(Time::is_date);
        let tz = scan.iter().find_map(Time::tz);

        let start = convert_to_datetime(original_start, tz);
        let rdates = rdates
            .into_iter()
            .map(|rdate| convert_to_datetime(rdate, tz))
            .collect();

        let rule_set = RecurrenceRuleSet::new(start, tz, is_all_dates, core.rrules(), rdates)?;

        Ok(RecurrenceRules {
            core,
            original_start,
            original_end,
            tz,
            rule_set,
            check_exdates_datetime,
            check_exdates_date,
            replace_ends,
        })
    }

    fn rrule_between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Time>, Error> {
        let lo = convert_to_datetime(*span_start, self.tz);
        let hi = convert_to_datetime(*span_stop, self.tz);
        self.rule_set.between(&lo, &hi)
    }

    /// Produce an occurrence, converting the span back to dates when the
    /// core was specified with dates on both ends.
    fn as_occurrence(
        &self,
        start: Time,
        end: Time,
        adapter: &Arc<Adapter>,
        sequence: i64,
    ) -> Occurrence {
        if self.original_start.is_date() && self.original_end.is_date() {
            Occurrence::new(
                adapter.clone(),
                Time::Date(start.date()),
                Time::Date(end.date()),
                sequence,
            )
        } else {
            Occurrence::new(adapter.clone(), start, end, sequence)
        }
    }
}

#[derive(Debug)]
enum Recurrence {
    /// No core component; only modifications materialize.
    NoRecurrence,
    Rules(RecurrenceRules),
}

/// All components sharing a UID: at most one core plus its modifications.
#[derive(Debug)]
pub struct Series {
    uid: String,
    recurrence: Recurrence,
    recurrence_id_to_modification: HashMap<RecurrenceId, Arc<Adapter>>,
    modifications: Vec<Arc<Adapter>>,
    this_and_future: Vec<RecurrenceId>,
    sequence: i64,
    subtract_from_start: Duration,
    add_to_stop: Duration,
}

impl Series {
    pub fn new(components: Vec<Arc<Adapter>>) -> Result<Series, Error> {
        let Some(first) = components.first() else {
            return Err(Error::InvalidCalendar(
                "no components given to calculate a series".to_string(),
            ));
        };
        let uid = first.uid().to_string();

        let mut recurrence_id_to_modification: HashMap<RecurrenceId, Arc<Adapter>> =
            HashMap::new();
        let mut this_and_future: Vec<RecurrenceId> = Vec::new();
        let mut core: Option<Arc<Adapter>> = None;

        for component in &components {
            if component.is_modification() {
                for recurrence_id in component.recurrence_ids() {
                    match recurrence_id_to_modification.get(recurrence_id) {
                        Some(existing) if existing.sequence() >= component.sequence() => {}
                        _ => {
                            recurrence_id_to_modification
                                .insert(*recurrence_id, component.clone());
                        }
                    }
                }
                if component.this_and_future() {
                    this_and_future.push(component.recurrence_ids()[0]);
                }
            } else {
                core = match core {
                    Some(existing) if existing.sequence() >= component.sequence() => {
                        Some(existing)
                    }
                    _ => Some(component.clone()),
                };
            }
        }
        this_and_future.sort();

        let mut modifications: Vec<Arc<Adapter>> = Vec::new();
        for adapter in recurrence_id_to_modification.values() {
            if !modifications
                .iter()
                .any(|known| Arc::ptr_eq(known, adapter))
            {
                modifications.push(adapter.clone());
            }
        }

        let sequence = components
            .iter()
            .map(|component| component.sequence())
            .max()
            .unwrap_or(-1);

        let recurrence = match core {
            Some(core) => Recurrence::Rules(RecurrenceRules::new(core)?),
            None => Recurrence::NoRecurrence,
        };

        // The probe window must reach every recurrence id whose occurrence
        // was moved into the query span: widen it by the worst case over the
        // core and every THISANDFUTURE modification.
        let (mut subtract_from_start, mut add_to_stop) = match &recurrence {
            Recurrence::Rules(rules) => rules.core.extend_query_span_by(),
            Recurrence::NoRecurrence => (Duration::zero(), Duration::zero()),
        };
        for recurrence_id in &this_and_future {
            if let Some(modification) = recurrence_id_to_modification.get(recurrence_id) {
                let (subtract, add) = modification.extend_query_span_by();
                subtract_from_start = subtract_from_start.max(subtract);
                add_to_stop = add_to_stop.max(add);
            }
        }

        Ok(Series {
            uid,
            recurrence,
            recurrence_id_to_modification,
            modifications,
            this_and_future,
            sequence,
            subtract_from_start,
            add_to_stop,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// The core (if any) and every modification.
    pub fn components(&self) -> Vec<&Arc<Adapter>> {
        let mut found = Vec::new();
        if let Recurrence::Rules(rules) = &self.recurrence {
            found.push(&rules.core);
        }
        found.extend(self.modifications.iter());
        found
    }

    /// The template in charge of a pattern slot: the latest THISANDFUTURE
    /// modification at or before it, else the core.
    fn template_for<'a>(
        &'a self,
        recurrence_id: &RecurrenceId,
        rules: &'a RecurrenceRules,
    ) -> &'a Arc<Adapter> {
        let mut component = &rules.core;
        for modification_id in &self.this_and_future {
            if modification_id < recurrence_id {
                if let Some(modification) =
                    self.recurrence_id_to_modification.get(modification_id)
                {
                    component = modification;
                }
            } else {
                break;
            }
        }
        component
    }
}

/// Any value stored under one of the identity forms, the last form winning.
fn get_any<'a>(
    map: &'a HashMap<RecurrenceId, Arc<Adapter>>,
    keys: &[RecurrenceId],
) -> Option<&'a Arc<Adapter>> {
    let mut found = None;
    for key in keys {
        if let Some(value) = map.get(key) {
            found = Some(value);
        }
    }
    found
}

fn get_any_duration(
    map: &HashMap<RecurrenceId, Duration>,
    keys: &[RecurrenceId],
) -> Option<Duration> {
    let mut found = None;
    for key in keys {
        if let Some(value) = map.get(key) {
            found = Some(*value);
        }
    }
    found
}

impl OccurrenceSource for Series {
    /// Occurrences between `span_start` (inclusive) and `span_stop`
    /// (exclusive), unordered.
    fn between(&self, span_start: &Time, span_stop: &Time) -> Result<Vec<Occurrence>, Error> {
        let mut occurrences: Vec<Occurrence> = Vec::new();
        let mut returned_starts: HashSet<Time> = HashSet::new();
        let mut returned_modifications: HashSet<usize> = HashSet::new();

        if let Recurrence::Rules(rules) = &self.recurrence {
            let expanded_start = add_duration(span_start, -self.subtract_from_start);
            let expanded_stop = add_duration(span_stop, self.add_to_stop);
            trace!(
                uid = self.uid.as_str(),
                ?expanded_start,
                ?expanded_stop,
                "expanding series"
            );

            for start in rules.rrule_between(&expanded_start, &expanded_stop)? {
                let recurrence_ids = to_recurrence_ids(&start);
                if returned_starts.contains(&start) {
                    continue;
                }
                if rules.check_exdates_date.contains(&start.date()) {
                    continue;
                }
                if recurrence_ids
                    .iter()
                    .any(|id| rules.check_exdates_datetime.contains(id))
                {
                    continue;
                }

                match get_any(&self.recurrence_id_to_modification, &recurrence_ids) {
                    Some(modification) => {
                        // the modification replaces this slot
                        let key = Arc::as_ptr(modification) as usize;
                        if !returned_modifications.insert(key) {
                            continue;
                        }
                        let occurrence = Occurrence::from_adapter(modification, self.sequence);
                        if occurrence.is_in_span(span_start, span_stop)? {
                            occurrences.push(occurrence);
                        }
                    }
                    None => {
                        returned_starts.insert(start);
                        let template = self.template_for(&recurrence_ids[0], rules);
                        let occurrence_start =
                            add_duration(&start, template.move_recurrences_by());
                        let end_delta =
                            get_any_duration(&rules.replace_ends, &recurrence_ids)
                                .unwrap_or_else(|| template.duration());
                        let occurrence_end = add_duration(&occurrence_start, end_delta);
                        let occurrence = rules.as_occurrence(
                            occurrence_start,
                            occurrence_end,
                            template,
                            self.sequence,
                        );
                        if occurrence.is_in_span(span_start, span_stop)? {
                            occurrences.push(occurrence);
                        }
                    }
                }
            }
        }

        // Modifications whose slot was not visited above. An EXDATE on the
        // slot removes the base instance only, never the modification.
        for modification in &self.modifications {
            let key = Arc::as_ptr(modification) as usize;
            if returned_modifications.contains(&key) {
                continue;
            }
            if modification.is_in_span(span_start, span_stop)? {
                returned_modifications.insert(key);
                occurrences.push(Occurrence::from_adapter(modification, self.sequence));
            }
        }

        Ok(occurrences)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::adapter::AdapterKind;
    use crate::time::cmp_times;
    use chrono::NaiveDate;
    use pretty_assertions_sorted::assert_eq;
    use recal_ical::{Component, Property};

    fn floating(y: i32, m: u32, d: u32, h: u32) -> Time {
        Time::Floating(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
        )
    }

    fn event(lines: &[(&str, &str)]) -> Arc<Adapter> {
        let mut component = Component::new("VEVENT");
        for (key, value) in lines {
            component.push_property(Property::new(key, value));
        }
        Arc::new(Adapter::new(AdapterKind::Event, component).unwrap())
    }

    fn starts(series: &Series, span_start: Time, span_stop: Time) -> Vec<Time> {
        let mut found: Vec<Time> = series
            .between(&span_start, &span_stop)
            .unwrap()
            .into_iter()
            .map(|occurrence| occurrence.start)
            .collect();
        found.sort_by(cmp_times);
        found
    }

    #[test]
    fn test_weekly_series_with_exdate_and_modification() {
        let core = event(&[
            ("UID", "weekly"),
            ("DTSTART", "20200113T090000"),
            ("DTEND", "20200113T100000"),
            ("RRULE", "FREQ=WEEKLY;BYDAY=MO"),
            ("EXDATE", "20200120T090000"),
        ]);
        let moved = event(&[
            ("UID", "weekly"),
            ("DTSTART", "20200127T110000"),
            ("DTEND", "20200127T120000"),
            ("RECURRENCE-ID", "20200127T090000"),
        ]);
        let series = Series::new(vec![core, moved]).unwrap();

        assert_eq!(
            starts(&series, floating(2020, 1, 13, 0), floating(2020, 2, 4, 0)),
            vec![
                floating(2020, 1, 13, 9),
                floating(2020, 1, 27, 11),
                floating(2020, 2, 3, 9),
            ]
        );
    }

    #[test]
    fn test_highest_sequence_wins_for_the_core() {
        let old = event(&[
            ("UID", "seq"),
            ("SEQUENCE", "0"),
            ("DTSTART", "20200101T090000"),
            ("DTEND", "20200101T100000"),
        ]);
        let new = event(&[
            ("UID", "seq"),
            ("SEQUENCE", "3"),
            ("DTSTART", "20200101T140000"),
            ("DTEND", "20200101T150000"),
        ]);
        let series = Series::new(vec![old, new]).unwrap();

        assert_eq!(
            starts(&series, floating(2020, 1, 1, 0), floating(2020, 1, 2, 0)),
            vec![floating(2020, 1, 1, 14)]
        );
        assert_eq!(series.sequence(), 3);
    }

    #[test]
    fn test_series_without_core_emits_its_modifications() {
        let modification = event(&[
            ("UID", "orphan"),
            ("DTSTART", "20210128T090000"),
            ("DTEND", "20210128T100000"),
            ("RECURRENCE-ID", "20210128T090000"),
        ]);
        let series = Series::new(vec![modification]).unwrap();

        assert_eq!(
            starts(&series, floating(2021, 1, 28, 0), floating(2021, 1, 29, 0)),
            vec![floating(2021, 1, 28, 9)]
        );
        assert_eq!(
            starts(&series, floating(2021, 2, 1, 0), floating(2021, 2, 2, 0)),
            vec![]
        );
    }

    #[test]
    fn test_exdate_does_not_remove_a_modification() {
        let core = event(&[
            ("UID", "kept"),
            ("DTSTART", "20200106T090000"),
            ("DTEND", "20200106T100000"),
            ("RRULE", "FREQ=WEEKLY;BYDAY=MO;COUNT=4"),
            ("EXDATE", "20200113T090000"),
        ]);
        let modification = event(&[
            ("UID", "kept"),
            ("DTSTART", "20200113T150000"),
            ("DTEND", "20200113T160000"),
            ("RECURRENCE-ID", "20200113T090000"),
        ]);
        let series = Series::new(vec![core, modification]).unwrap();

        assert_eq!(
            starts(&series, floating(2020, 1, 13, 0), floating(2020, 1, 14, 0)),
            vec![floating(2020, 1, 13, 15)]
        );
    }

    #[test]
    fn test_rdate_coinciding_with_a_rule_instance_is_not_duplicated() {
        let core = event(&[
            ("UID", "dup"),
            ("DTSTART", "20200101T090000"),
            ("DTEND", "20200101T100000"),
            ("RRULE", "FREQ=DAILY;COUNT=3"),
            ("RDATE", "20200102T090000"),
        ]);
        let series = Series::new(vec![core]).unwrap();

        assert_eq!(
            starts(&series, floating(2020, 1, 1, 0), floating(2020, 1, 4, 0)),
            vec![
                floating(2020, 1, 1, 9),
                floating(2020, 1, 2, 9),
                floating(2020, 1, 3, 9),
            ]
        );
    }

    #[test]
    fn test_rdate_period_replaces_the_end() {
        let core = event(&[
            ("UID", "period"),
            ("DTSTART", "20200101T090000Z"),
            ("DTEND", "20200101T093000Z"),
            ("RDATE;VALUE=PERIOD", "20200105T090000Z/PT4H"),
        ]);
        let series = Series::new(vec![core]).unwrap();
        let occurrences = series
            .between(
                &floating(2020, 1, 5, 0),
                &floating(2020, 1, 6, 0),
            )
            .unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(
            sub_times(&occurrences[0].end, &occurrences[0].start),
            Duration::hours(4)
        );
    }

    #[test]
    fn test_this_and_future_moves_later_slots() {
        let core = event(&[
            ("UID", "taf"),
            ("DTSTART", "20200101T090000"),
            ("DTEND", "20200101T093000"),
            ("RRULE", "FREQ=DAILY;COUNT=5"),
        ]);
        let mut component = Component::new("VEVENT");
        for (key, value) in [
            ("UID", "taf"),
            ("DTSTART", "20200103T110000"),
            ("DTEND", "20200103T113000"),
        ] {
            component.push_property(Property::new(key, value));
        }
        let mut recurrence_id = Property::new("RECURRENCE-ID", "20200103T090000");
        recurrence_id
            .params
            .push(recal_ical::Param::new("RANGE", "THISANDFUTURE"));
        component.push_property(recurrence_id);
        let moved = Arc::new(Adapter::new(AdapterKind::Event, component).unwrap());

        let series = Series::new(vec![core, moved]).unwrap();

        assert_eq!(
            starts(&series, floating(2020, 1, 1, 0), floating(2020, 1, 6, 0)),
            vec![
                floating(2020, 1, 1, 9),
                floating(2020, 1, 2, 9),
                // the modification itself
                floating(2020, 1, 3, 11),
                // later slots shifted by the same two hours
                floating(2020, 1, 4, 11),
                floating(2020, 1, 5, 11),
            ]
        );
    }

    #[test]
    fn test_zero_length_event_at_span_start_is_reported_once() {
        let core = event(&[("UID", "point"), ("DTSTART", "20200101T090000")]);
        let series = Series::new(vec![core]).unwrap();
        assert_eq!(
            starts(&series, floating(2020, 1, 1, 9), floating(2020, 1, 2, 0)),
            vec![floating(2020, 1, 1, 9)]
        );
    }

    #[test]
    fn test_date_typed_exdate_suppresses_a_datetime_instance() {
        let core = event(&[
            ("UID", "datedel"),
            ("DTSTART", "20200101T090000"),
            ("DTEND", "20200101T100000"),
            ("RRULE", "FREQ=DAILY;COUNT=3"),
            ("EXDATE;VALUE=DATE", "20200102"),
        ]);
        let series = Series::new(vec![core]).unwrap();
        assert_eq!(
            starts(&series, floating(2020, 1, 1, 0), floating(2020, 1, 4, 0)),
            vec![floating(2020, 1, 1, 9), floating(2020, 1, 3, 9)]
        );
    }
}

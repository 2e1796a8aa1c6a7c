use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use tracing::debug;

use recal_ical::{midnight, Component, Time};

use crate::errors::{Error, ErrorKind, SUPPRESSIBLE_ERRORS};
use crate::occurrence::{Occurrence, OccurrenceId};
use crate::pages::Pages;
use crate::selection::{AllKnownComponents, ComponentsWithName, SelectComponents};
use crate::series::OccurrenceSource;
use crate::time::{checked_add, cmp_times, compare_greater, DATE_MAX, DATE_MIN};

/// A date input in one of the accepted shapes.
#[derive(Debug, Clone)]
pub enum DateArgument {
    /// 1 to 6 numbers: year, month, day, hour, minute, second.
    Numbers(Vec<i32>),
    /// `YYYYMMDD` or `YYYYMMDDThhmmssZ`.
    Text(String),
    Time(Time),
}

impl From<i32> for DateArgument {
    fn from(year: i32) -> DateArgument {
        DateArgument::Numbers(vec![year])
    }
}

impl From<(i32,)> for DateArgument {
    fn from(value: (i32,)) -> DateArgument {
        DateArgument::Numbers(vec![value.0])
    }
}

impl From<(i32, u32)> for DateArgument {
    fn from(value: (i32, u32)) -> DateArgument {
        DateArgument::Numbers(vec![value.0, value.1 as i32])
    }
}

impl From<(i32, u32, u32)> for DateArgument {
    fn from(value: (i32, u32, u32)) -> DateArgument {
        DateArgument::Numbers(vec![value.0, value.1 as i32, value.2 as i32])
    }
}

impl From<(i32, u32, u32, u32)> for DateArgument {
    fn from(value: (i32, u32, u32, u32)) -> DateArgument {
        DateArgument::Numbers(vec![value.0, value.1 as i32, value.2 as i32, value.3 as i32])
    }
}

impl From<(i32, u32, u32, u32, u32)> for DateArgument {
    fn from(value: (i32, u32, u32, u32, u32)) -> DateArgument {
        DateArgument::Numbers(vec![
            value.0,
            value.1 as i32,
            value.2 as i32,
            value.3 as i32,
            value.4 as i32,
        ])
    }
}

impl From<(i32, u32, u32, u32, u32, u32)> for DateArgument {
    fn from(value: (i32, u32, u32, u32, u32, u32)) -> DateArgument {
        DateArgument::Numbers(vec![
            value.0,
            value.1 as i32,
            value.2 as i32,
            value.3 as i32,
            value.4 as i32,
            value.5 as i32,
        ])
    }
}

impl From<&str> for DateArgument {
    fn from(text: &str) -> DateArgument {
        DateArgument::Text(text.to_string())
    }
}

impl From<String> for DateArgument {
    fn from(text: String) -> DateArgument {
        DateArgument::Text(text)
    }
}

impl From<NaiveDate> for DateArgument {
    fn from(date: NaiveDate) -> DateArgument {
        DateArgument::Time(Time::Date(date))
    }
}

impl From<NaiveDateTime> for DateArgument {
    fn from(dt: NaiveDateTime) -> DateArgument {
        DateArgument::Time(Time::Floating(dt))
    }
}

impl From<Time> for DateArgument {
    fn from(time: Time) -> DateArgument {
        DateArgument::Time(time)
    }
}

fn bad_argument(argument: &impl std::fmt::Debug) -> Error {
    Error::BadArgument(format!("cannot interpret {argument:?} as a date"))
}

fn numbers_to_datetime(numbers: &[i32]) -> Result<NaiveDateTime, Error> {
    if numbers.is_empty() || numbers.len() > 6 {
        return Err(bad_argument(&numbers));
    }
    let mut padded = numbers.to_vec();
    while padded.len() < 3 {
        padded.push(1);
    }
    let to_u32 = |value: i32| u32::try_from(value).map_err(|_| bad_argument(&numbers));
    let date = NaiveDate::from_ymd_opt(padded[0], to_u32(padded[1])?, to_u32(padded[2])?)
        .ok_or_else(|| bad_argument(&numbers))?;
    let hour = padded.get(3).copied().unwrap_or(0);
    let minute = padded.get(4).copied().unwrap_or(0);
    let second = padded.get(5).copied().unwrap_or(0);
    date.and_hms_opt(to_u32(hour)?, to_u32(minute)?, to_u32(second)?)
        .ok_or_else(|| bad_argument(&numbers))
}

impl DateArgument {
    /// Coerce to a concrete time, the way query arguments are interpreted:
    /// numbers pad to a naive datetime, text is `YYYYMMDD` or
    /// `YYYYMMDDThhmmssZ` (interpreted as a naive datetime).
    pub fn to_time(&self) -> Result<Time, Error> {
        match self {
            DateArgument::Numbers(numbers) => {
                numbers_to_datetime(numbers).map(Time::Floating)
            }
            DateArgument::Text(text) => match text.len() {
                8 => NaiveDate::parse_from_str(text, "%Y%m%d")
                    .map(|date| Time::Floating(midnight(date)))
                    .map_err(|_| bad_argument(text)),
                16 => NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%SZ")
                    .map(Time::Floating)
                    .map_err(|_| bad_argument(text)),
                _ => Err(bad_argument(text)),
            },
            DateArgument::Time(time) => Ok(*time),
        }
    }
}

/// The second argument of `between`: an end or a duration from the start.
#[derive(Debug, Clone)]
pub enum SpanStop {
    At(DateArgument),
    Duration(Duration),
}

impl From<Duration> for SpanStop {
    fn from(duration: Duration) -> SpanStop {
        SpanStop::Duration(duration)
    }
}

macro_rules! impl_span_stop_from {
    ($($from:ty),* $(,)?) => {
        $(
            impl From<$from> for SpanStop {
                fn from(value: $from) -> SpanStop {
                    SpanStop::At(value.into())
                }
            }
        )*
    };
}

impl_span_stop_from!(
    i32,
    (i32,),
    (i32, u32),
    (i32, u32, u32),
    (i32, u32, u32, u32),
    (i32, u32, u32, u32, u32),
    (i32, u32, u32, u32, u32, u32),
    &str,
    String,
    NaiveDate,
    NaiveDateTime,
    Time,
);

/// Which component kinds (or custom strategies) a query expands.
#[derive(Debug, Clone)]
pub enum ComponentSelector {
    Name(String),
    AllKnown,
    Custom(Arc<dyn SelectComponents>),
}

impl ComponentSelector {
    pub fn name(name: &str) -> ComponentSelector {
        ComponentSelector::Name(name.to_string())
    }

    fn strategy(&self) -> Arc<dyn SelectComponents> {
        match self {
            ComponentSelector::Name(name) => Arc::new(ComponentsWithName::new(name)),
            ComponentSelector::AllKnown => Arc::new(AllKnownComponents),
            ComponentSelector::Custom(custom) => custom.clone(),
        }
    }
}

/// Start a query over a calendar. Events are expanded unless other
/// components are selected.
pub fn of(calendar: &Component) -> QueryBuilder<'_> {
    QueryBuilder {
        calendar,
        keep_recurrence_attributes: false,
        components: vec![ComponentSelector::name("VEVENT")],
        skip_bad_series: false,
    }
}

#[derive(Debug)]
pub struct QueryBuilder<'a> {
    calendar: &'a Component,
    keep_recurrence_attributes: bool,
    components: Vec<ComponentSelector>,
    skip_bad_series: bool,
}

impl QueryBuilder<'_> {
    /// Keep RRULE, RDATE and EXDATE on the emitted copies.
    pub fn keep_recurrence_attributes(mut self, keep: bool) -> Self {
        self.keep_recurrence_attributes = keep;
        self
    }

    pub fn components(mut self, components: Vec<ComponentSelector>) -> Self {
        self.components = components;
        self
    }

    /// Drop series whose expansion fails instead of failing the query.
    pub fn skip_bad_series(mut self, skip: bool) -> Self {
        self.skip_bad_series = skip;
        self
    }

    pub fn build(self) -> Result<CalendarQuery, Error> {
        CalendarQuery::new(
            self.calendar,
            self.keep_recurrence_attributes,
            &self.components,
            self.skip_bad_series,
        )
    }
}

/// A calendar that can unfold its components at a certain time.
///
/// Built once per calendar; the series list is read-only afterwards, so a
/// query can be shared across threads.
#[derive(Debug)]
pub struct CalendarQuery {
    sources: Vec<Arc<dyn OccurrenceSource>>,
    keep_recurrence_attributes: bool,
    suppressed: Vec<ErrorKind>,
}

impl CalendarQuery {
    fn new(
        calendar: &Component,
        keep_recurrence_attributes: bool,
        components: &[ComponentSelector],
        skip_bad_series: bool,
    ) -> Result<CalendarQuery, Error> {
        let calscale = calendar
            .property("CALSCALE")
            .map(|property| property.value.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "GREGORIAN".to_string());
        if calscale != "GREGORIAN" {
            return Err(Error::InvalidCalendar(
                "only Gregorian calendars are supported".to_string(),
            ));
        }

        let suppressed: Vec<ErrorKind> = if skip_bad_series {
            SUPPRESSIBLE_ERRORS.to_vec()
        } else {
            Vec::new()
        };

        let mut sources = Vec::new();
        for selector in components {
            sources.extend(selector.strategy().collect_sources(calendar, &suppressed)?);
        }

        Ok(CalendarQuery {
            sources,
            keep_recurrence_attributes,
            suppressed,
        })
    }

    fn occurrences_between(
        &self,
        span_start: &Time,
        span_stop: &Time,
    ) -> Result<Vec<Occurrence>, Error> {
        let mut occurrences = Vec::new();
        for source in &self.sources {
            match source.between(span_start, span_stop) {
                Ok(mut found) => occurrences.append(&mut found),
                Err(error) if self.suppressed.contains(&error.kind()) => {
                    debug!(%error, "dropping a bad series from the result");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(occurrences)
    }

    fn components_between(
        &self,
        span_start: &Time,
        span_stop: &Time,
    ) -> Result<Vec<Component>, Error> {
        Ok(self
            .occurrences_between(span_start, span_stop)?
            .into_iter()
            .map(|occurrence| occurrence.as_component(self.keep_recurrence_attributes))
            .collect())
    }

    /// All components within the natural span of the argument: a year, a
    /// month, a day, an hour/minute/second span, or a single instant.
    pub fn at(&self, date: impl Into<DateArgument>) -> Result<Vec<Component>, Error> {
        let argument = date.into();
        match argument {
            DateArgument::Time(time @ (Time::Floating(_) | Time::Zoned(_))) => {
                self.components_between(&time, &time)
            }
            DateArgument::Time(Time::Date(date)) => {
                let start = Time::Date(date);
                let stop = Time::Date(date + Duration::days(1));
                self.components_between(&start, &stop)
            }
            DateArgument::Text(text) => {
                if text.len() != 8 || !text.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(Error::BadArgument(format!(
                        "format yyyymmdd expected, not {text:?}"
                    )));
                }
                let date = NaiveDate::parse_from_str(&text, "%Y%m%d")
                    .map_err(|_| bad_argument(&text))?;
                self.at(Time::Date(date))
            }
            DateArgument::Numbers(numbers) => self.at_numbers(&numbers),
        }
    }

    fn at_numbers(&self, numbers: &[i32]) -> Result<Vec<Component>, Error> {
        match numbers.len() {
            1 => {
                let year = numbers[0];
                self.between((year, 1u32, 1u32), (year + 1, 1u32, 1u32))
            }
            2 => {
                let (year, month) = (numbers[0], numbers[1]);
                if month == 12 {
                    self.between((year, 12u32, 1u32), (year + 1, 1u32, 1u32))
                } else {
                    let next = u32::try_from(month + 1).map_err(|_| bad_argument(&numbers))?;
                    let month = u32::try_from(month).map_err(|_| bad_argument(&numbers))?;
                    self.between((year, month, 1u32), (year, next, 1u32))
                }
            }
            3..=6 => {
                let deltas = [
                    Duration::days(1),
                    Duration::hours(1),
                    Duration::minutes(1),
                    Duration::seconds(1),
                ];
                let start = Time::Floating(numbers_to_datetime(numbers)?);
                let stop = checked_add(&start, deltas[numbers.len() - 3])
                    .ok_or_else(|| bad_argument(&numbers))?;
                self.components_between(&start, &stop)
            }
            _ => Err(bad_argument(&numbers)),
        }
    }

    /// All components between `start` (inclusive) and `stop` (exclusive).
    /// `stop` may be a duration relative to `start`.
    pub fn between(
        &self,
        start: impl Into<DateArgument>,
        stop: impl Into<SpanStop>,
    ) -> Result<Vec<Component>, Error> {
        let span_start = start.into().to_time()?;
        let span_stop = match stop.into() {
            SpanStop::At(argument) => argument.to_time()?,
            SpanStop::Duration(duration) => checked_add(&span_start, duration)
                .ok_or_else(|| Error::BadArgument("the span is out of range".to_string()))?,
        };
        self.components_between(&span_start, &span_stop)
    }

    fn occurrences_after(&self, earliest_end: Time) -> OccurrencesAfter<'_> {
        OccurrencesAfter {
            query: self,
            earliest_end,
            time_span: Duration::days(1),
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            done: false,
            failed: false,
        }
    }

    /// All components during or after `earliest_end`, ordered by start and
    /// de-duplicated. The iterator is lazy; calendars can hold millions of
    /// occurrences.
    pub fn after(
        &self,
        earliest_end: impl Into<DateArgument>,
    ) -> Result<ComponentsAfter<'_>, Error> {
        let earliest_end = earliest_end.into().to_time()?;
        Ok(ComponentsAfter {
            occurrences: self.occurrences_after(earliest_end),
            keep_recurrence_attributes: self.keep_recurrence_attributes,
        })
    }

    /// Every component from the safety minimum on, ordered by start.
    pub fn all(&self) -> Result<ComponentsAfter<'_>, Error> {
        self.after(Time::Date(*DATE_MIN))
    }

    /// The number of occurrences in this calendar.
    pub fn count(&self) -> Result<usize, Error> {
        let mut count = 0;
        for component in self.all()? {
            component?;
            count += 1;
        }
        Ok(count)
    }

    /// The first occurrence of this calendar as a component.
    pub fn first(&self) -> Result<Component, Error> {
        let mut components = self.all()?;
        match components.next() {
            Some(component) => component,
            None => Err(Error::NoOccurrence),
        }
    }

    /// Page through the `after` stream. `next_page_id` continues an earlier
    /// walk; it can never reach back before `earliest_end`.
    pub fn paginate(
        &self,
        page_size: usize,
        earliest_end: Option<DateArgument>,
        latest_start: Option<DateArgument>,
        next_page_id: &str,
    ) -> Result<Pages<'_>, Error> {
        if page_size == 0 {
            return Err(Error::BadArgument(
                "a page must have at least one component".to_string(),
            ));
        }
        let latest_start = latest_start
            .map(|argument| argument.to_time())
            .transpose()?;
        let earliest_end = earliest_end
            .map(|argument| argument.to_time())
            .transpose()?
            .unwrap_or(Time::Date(*DATE_MIN));

        let mut prefix: Vec<Occurrence> = Vec::new();
        let iterator = if next_page_id.is_empty() {
            self.occurrences_after(earliest_end)
        } else {
            let target = OccurrenceId::from_string(next_page_id)?;
            if compare_greater(&earliest_end, &target.start) {
                // the cursor points before the lower bound; clamp to it
                self.occurrences_after(earliest_end)
            } else {
                let mut iterator = self.occurrences_after(target.start);
                let mut passed: Vec<Occurrence> = Vec::new();
                for item in iterator.by_ref() {
                    let occurrence = item?;
                    let id = occurrence.id();
                    if id == target {
                        prefix = vec![occurrence];
                        break;
                    }
                    passed.push(occurrence);
                    if compare_greater(&id.start, &target.start) {
                        // the cursor's occurrence is gone; stay monotonic
                        break;
                    }
                }
                if prefix.is_empty() {
                    // no exact match: resume with everything pulled past the
                    // lost cursor, including a stream that ends at its start
                    prefix = passed;
                }
                iterator
            }
        };

        Pages::new(
            prefix,
            iterator,
            page_size,
            latest_start,
            self.keep_recurrence_attributes,
        )
    }
}

/// The widening scan behind `after`: probe a window, emit what is new,
/// double the window when it was empty and halve it when it was not.
#[derive(Debug)]
pub(crate) struct OccurrencesAfter<'a> {
    query: &'a CalendarQuery,
    earliest_end: Time,
    time_span: Duration,
    buffer: VecDeque<Occurrence>,
    seen: HashSet<OccurrenceId>,
    done: bool,
    failed: bool,
}

const MIN_TIME_SPAN_MINUTES: i64 = 15;

impl Iterator for OccurrencesAfter<'_> {
    type Item = Result<Occurrence, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(occurrence) = self.buffer.pop_front() {
                return Some(Ok(occurrence));
            }
            if self.done || self.failed {
                return None;
            }

            let cap = Time::Date(*DATE_MAX);
            if compare_greater(&self.earliest_end, &cap) {
                self.done = true;
                return None;
            }
            let next_end = match checked_add(&self.earliest_end, self.time_span) {
                Some(next_end) if !compare_greater(&next_end, &cap) => next_end,
                _ => {
                    self.done = true;
                    cap
                }
            };

            match self
                .query
                .occurrences_between(&self.earliest_end, &next_end)
            {
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
                Ok(occurrences) => {
                    let found_any = !occurrences.is_empty();
                    for occurrence in occurrences
                        .into_iter()
                        .sorted_by(|a, b| cmp_times(&a.start, &b.start))
                    {
                        if self.seen.insert(occurrence.id()) {
                            self.buffer.push_back(occurrence);
                        }
                    }
                    self.time_span = if found_any {
                        self.time_span / 2
                    } else {
                        self.time_span * 2
                    }
                    .max(Duration::minutes(MIN_TIME_SPAN_MINUTES));
                    self.earliest_end = next_end;
                }
            }
        }
    }
}

/// Iterator over the components of `after` / `all`.
#[derive(Debug)]
pub struct ComponentsAfter<'a> {
    occurrences: OccurrencesAfter<'a>,
    keep_recurrence_attributes: bool,
}

impl Iterator for ComponentsAfter<'_> {
    type Item = Result<Component, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let keep = self.keep_recurrence_attributes;
        self.occurrences
            .next()
            .map(|item| item.map(|occurrence| occurrence.as_component(keep)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use pretty_assertions_sorted::assert_eq;
    use recal_ical::parse_calendar;

    fn calendar() -> Component {
        parse_calendar(
            "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:weekly\r\n\
DTSTART:20200106T090000Z\r\n\
DTEND:20200106T100000Z\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=10\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
        )
        .unwrap()
    }

    #[test]
    fn test_non_gregorian_calendars_are_rejected() {
        let source = parse_calendar(
            "BEGIN:VCALENDAR\r\n\
CALSCALE:HEBREW\r\n\
END:VCALENDAR\r\n",
        )
        .unwrap();
        let error = of(&source).build().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidCalendar);
    }

    #[test]
    fn test_date_argument_coercion() {
        assert_eq!(
            DateArgument::from(2019).to_time().unwrap(),
            Time::Floating(
                NaiveDate::from_ymd_opt(2019, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            DateArgument::from("20190304").to_time().unwrap(),
            Time::Floating(
                NaiveDate::from_ymd_opt(2019, 3, 4)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            DateArgument::from("20190304T080000Z").to_time().unwrap(),
            Time::Floating(
                NaiveDate::from_ymd_opt(2019, 3, 4)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap()
            )
        );
        assert!(DateArgument::from("2019-03-04").to_time().is_err());
    }

    #[test]
    fn test_at_a_day() {
        let query = of(&calendar()).build().unwrap();
        let found = query.at("20200113").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].property("DTSTART").unwrap().value,
            "20200113T090000Z"
        );
    }

    #[test]
    fn test_at_a_month_and_a_year() {
        let query = of(&calendar()).build().unwrap();
        assert_eq!(query.at((2020, 1u32)).unwrap().len(), 4);
        assert_eq!(query.at(2020).unwrap().len(), 10);
        assert_eq!(query.at(2019).unwrap().len(), 0);
    }

    #[test]
    fn test_at_an_instant_is_a_zero_length_span() {
        let query = of(&calendar()).build().unwrap();
        let inside = NaiveDate::from_ymd_opt(2020, 1, 13)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(query.at(inside).unwrap().len(), 1);
        let outside = NaiveDate::from_ymd_opt(2020, 1, 13)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap();
        assert_eq!(query.at(outside).unwrap().len(), 0);
    }

    #[test]
    fn test_between_with_a_duration_stop() {
        let query = of(&calendar()).build().unwrap();
        let found = query.between("20200113", Duration::days(8)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_after_is_ordered_and_deduplicated() {
        let query = of(&calendar()).build().unwrap();
        let mut last: Option<String> = None;
        let mut count = 0;
        for component in query.after("20200101").unwrap() {
            let component = component.unwrap();
            let start = component.property("DTSTART").unwrap().value.clone();
            if let Some(previous) = &last {
                assert!(previous <= &start);
            }
            last = Some(start);
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn test_count_and_first() {
        let query = of(&calendar()).build().unwrap();
        assert_eq!(query.count().unwrap(), 10);
        let first = query.first().unwrap();
        assert_eq!(
            first.property("DTSTART").unwrap().value,
            "20200106T090000Z"
        );
    }

    #[test]
    fn test_first_of_an_empty_calendar() {
        let source = parse_calendar("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").unwrap();
        let query = of(&source).build().unwrap();
        assert_eq!(query.first().unwrap_err(), Error::NoOccurrence);
    }

    #[test]
    fn test_sequence_number_is_propagated() {
        let source = parse_calendar(
            "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:seq\r\n\
SEQUENCE:2\r\n\
DTSTART:20200106T090000Z\r\n\
DTEND:20200106T100000Z\r\n\
RRULE:FREQ=DAILY;COUNT=2\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:seq\r\n\
SEQUENCE:5\r\n\
DTSTART:20200107T110000Z\r\n\
DTEND:20200107T120000Z\r\n\
RECURRENCE-ID:20200107T090000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
        )
        .unwrap();
        let query = of(&source).build().unwrap();
        for component in query.all().unwrap() {
            assert_eq!(component.unwrap().property("SEQUENCE").unwrap().value, "5");
        }
    }

    #[test]
    fn test_keep_recurrence_attributes() {
        let query = of(&calendar()).keep_recurrence_attributes(true).build().unwrap();
        let found = query.at("20200113").unwrap();
        assert!(found[0].property("RRULE").is_some());

        let query = of(&calendar()).build().unwrap();
        let found = query.at("20200113").unwrap();
        assert!(found[0].property("RRULE").is_none());
    }
}

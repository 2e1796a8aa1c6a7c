use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::Duration;

use recal_ical::{Component, PeriodEnd, Time};

use crate::errors::Error;
use crate::time::{
    add_duration, cmp_times, make_comparable, sub_times, time_span_contains_event,
    to_recurrence_ids, RecurrenceId, DATE_MAX, DATE_MIN,
};

static SYNTHETIC_UID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A UID stand-in for components that carry none.
pub fn synthetic_uid() -> String {
    let count = SYNTHETIC_UID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("recal-without-uid-{count}")
}

/// The closed set of recurring component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Event,
    Todo,
    Journal,
}

impl AdapterKind {
    pub fn component_name(&self) -> &'static str {
        match self {
            AdapterKind::Event => "VEVENT",
            AdapterKind::Todo => "VTODO",
            AdapterKind::Journal => "VJOURNAL",
        }
    }

    /// The property carrying the end of the component, if the kind has one.
    pub fn end_property(&self) -> Option<&'static str> {
        match self {
            AdapterKind::Event => Some("DTEND"),
            AdapterKind::Todo => Some("DUE"),
            AdapterKind::Journal => None,
        }
    }

    pub fn from_name(name: &str) -> Option<AdapterKind> {
        match name.to_ascii_uppercase().as_str() {
            "VEVENT" => Some(AdapterKind::Event),
            "VTODO" => Some(AdapterKind::Todo),
            "VJOURNAL" => Some(AdapterKind::Journal),
            _ => None,
        }
    }
}

/// An RDATE entry: a plain time or a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RDate {
    At(Time),
    Period(Time, PeriodEnd),
}

/// A uniform, eagerly decoded view over one calendar component.
///
/// All per-kind behavior is decided here at construction time, so a
/// malformed component surfaces its error while its series is collected.
#[derive(Debug)]
pub struct Adapter {
    kind: AdapterKind,
    component: Component,
    uid: String,
    start: Time,
    end: Time,
    rrules: Vec<String>,
    rdates: Vec<RDate>,
    exdates: Vec<Time>,
    recurrence_id: Option<Time>,
    recurrence_ids: Vec<RecurrenceId>,
    this_and_future: bool,
    sequence: i64,
}

impl Adapter {
    pub fn new(kind: AdapterKind, component: Component) -> Result<Adapter, Error> {
        let uid = component
            .property("UID")
            .map(|property| property.value.trim().to_string())
            .unwrap_or_else(synthetic_uid);

        let raw_start = raw_start(kind, &component)?;
        let raw_end = raw_end(kind, &component, &raw_start)?;
        let span = make_comparable(&[raw_start, raw_end]);

        let mut rrules: Vec<String> = Vec::new();
        for property in component.properties_named("RRULE") {
            let rule = property.value.trim().to_string();
            if !rrules.contains(&rule) {
                rrules.push(rule);
            }
        }

        let mut rdates = Vec::new();
        for property in component.properties_named("RDATE") {
            if property.is_period_value() {
                for (start, end) in property.as_periods()? {
                    rdates.push(RDate::Period(start, end));
                }
            } else {
                for time in property.as_date_times()? {
                    rdates.push(RDate::At(time));
                }
            }
        }

        let mut exdates = Vec::new();
        for property in component.properties_named("EXDATE") {
            exdates.extend(property.as_date_times()?);
        }

        let recurrence_id_property = component.property("RECURRENCE-ID");
        let this_and_future = recurrence_id_property
            .and_then(|property| property.param("RANGE"))
            .map(|range| range.eq_ignore_ascii_case("THISANDFUTURE"))
            .unwrap_or(false);
        let recurrence_id = recurrence_id_property
            .map(|property| property.as_date_time())
            .transpose()?;
        let recurrence_ids = recurrence_id
            .as_ref()
            .map(to_recurrence_ids)
            .unwrap_or_default();

        let sequence = component
            .property("SEQUENCE")
            .map(|property| property.as_integer())
            .transpose()?
            .unwrap_or(-1);

        Ok(Adapter {
            kind,
            component,
            uid,
            start: span[0],
            end: span[1],
            rrules,
            rdates,
            exdates,
            recurrence_id,
            recurrence_ids,
            this_and_future,
            sequence,
        })
    }

    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    pub fn component_name(&self) -> &'static str {
        self.kind.component_name()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn end(&self) -> Time {
        self.end
    }

    pub fn duration(&self) -> Duration {
        sub_times(&self.end, &self.start)
    }

    pub fn rrules(&self) -> &[String] {
        &self.rrules
    }

    pub fn rdates(&self) -> &[RDate] {
        &self.rdates
    }

    pub fn exdates(&self) -> &[Time] {
        &self.exdates
    }

    pub fn recurrence_ids(&self) -> &[RecurrenceId] {
        &self.recurrence_ids
    }

    pub fn is_modification(&self) -> bool {
        !self.recurrence_ids.is_empty()
    }

    pub fn this_and_future(&self) -> bool {
        self.this_and_future
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// The VALARM subcomponents of this component.
    pub fn alarms(&self) -> Vec<&Component> {
        self.component.walk("VALARM")
    }

    pub fn is_in_span(&self, span_start: &Time, span_stop: &Time) -> Result<bool, Error> {
        time_span_contains_event(span_start, span_stop, &self.start, &self.end)
    }

    /// How far beyond a query window the pattern has to be enumerated so
    /// that a moved modification whose recurrence id lies outside the window
    /// is still visited. Returns `(subtract_from_start, add_to_stop)`.
    pub fn extend_query_span_by(&self) -> (Duration, Duration) {
        let mut subtract_from_start = self.duration();
        let mut add_to_stop = Duration::zero();
        if let Some(recurrence_id) = &self.recurrence_id {
            let lifted = make_comparable(&[self.start, self.end, *recurrence_id]);
            let (start, end, recurrence_id) = (&lifted[0], &lifted[1], &lifted[2]);
            match cmp_times(start, recurrence_id) {
                std::cmp::Ordering::Less => {
                    add_to_stop = sub_times(recurrence_id, start);
                }
                std::cmp::Ordering::Greater => {
                    subtract_from_start = sub_times(end, recurrence_id);
                }
                std::cmp::Ordering::Equal => {}
            }
        }
        (subtract_from_start, add_to_stop)
    }

    /// The translation a THISANDFUTURE modification applies to every pattern
    /// slot at or after its recurrence id. Zero otherwise.
    pub fn move_recurrences_by(&self) -> Duration {
        if !self.this_and_future {
            return Duration::zero();
        }
        match &self.recurrence_id {
            Some(recurrence_id) => sub_times(&self.start, recurrence_id),
            None => Duration::zero(),
        }
    }

    /// A copy of the component materialized at the given start and end.
    ///
    /// DURATION is dropped so it cannot disagree with the new end. Unless
    /// `keep_recurrence_attributes` is set, RRULE, RDATE and EXDATE are
    /// stripped. Every emitted component carries a RECURRENCE-ID, defaulting
    /// to its start.
    pub fn as_component(
        &self,
        start: &Time,
        end: &Time,
        keep_recurrence_attributes: bool,
    ) -> Component {
        let mut copied = self.component.clone();
        copied.set_date_time("DTSTART", start);
        copied.remove_properties("DURATION");
        if let Some(end_property) = self.kind.end_property() {
            copied.set_date_time(end_property, end);
        }
        if !keep_recurrence_attributes {
            for attribute in ["RRULE", "RDATE", "EXDATE"] {
                copied.remove_properties(attribute);
            }
        }
        if copied.property("RECURRENCE-ID").is_none() {
            copied.set_date_time("RECURRENCE-ID", start);
        }
        copied
    }
}

fn missing(kind: AdapterKind, property: &str) -> Error {
    Error::InvalidCalendar(format!(
        "{} without {property}",
        kind.component_name()
    ))
}

fn raw_start(kind: AdapterKind, component: &Component) -> Result<Time, Error> {
    let dtstart = component
        .property("DTSTART")
        .map(|property| property.as_date_time())
        .transpose()?;
    match kind {
        AdapterKind::Event => dtstart.ok_or_else(|| missing(kind, "DTSTART")),
        AdapterKind::Todo => {
            if let Some(start) = dtstart {
                return Ok(start);
            }
            if let Some(due) = component.property("DUE") {
                return Ok(due.as_date_time()?);
            }
            Ok(Time::Date(*DATE_MIN))
        }
        AdapterKind::Journal => Ok(dtstart.unwrap_or(Time::Date(*DATE_MIN))),
    }
}

fn raw_end(kind: AdapterKind, component: &Component, start: &Time) -> Result<Time, Error> {
    match kind {
        AdapterKind::Event => {
            if let Some(end) = component.property("DTEND") {
                return Ok(end.as_date_time()?);
            }
            if let Some(duration) = component.property("DURATION") {
                return Ok(add_duration(start, duration.as_duration()?));
            }
            if start.is_date() {
                return Ok(add_duration(start, Duration::days(1)));
            }
            Ok(*start)
        }
        AdapterKind::Todo => {
            if let Some(due) = component.property("DUE") {
                return Ok(due.as_date_time()?);
            }
            let dtstart = component.property("DTSTART");
            if let (Some(_), Some(duration)) = (dtstart, component.property("DURATION")) {
                return Ok(add_duration(start, duration.as_duration()?));
            }
            if dtstart.is_some() {
                return Ok(*start);
            }
            Ok(Time::Date(*DATE_MAX))
        }
        AdapterKind::Journal => Ok(*start),
    }
}

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::Serialize;

use recal_ical::{Component, Time};

use crate::adapter::Adapter;
use crate::errors::Error;
use crate::time::{time_span_contains_event, RecurrenceId};

/// One materialized instance of a component.
#[derive(Debug, Clone)]
pub struct Occurrence {
    adapter: Arc<Adapter>,
    pub start: Time,
    pub end: Time,
    pub sequence: i64,
    alarm: Option<AlarmContext>,
}

/// Extra state carried when the occurrence is an alarm firing.
#[derive(Debug, Clone)]
struct AlarmContext {
    alarm: Component,
    parent_start: Time,
    parent_end: Time,
}

impl Occurrence {
    pub(crate) fn new(adapter: Arc<Adapter>, start: Time, end: Time, sequence: i64) -> Occurrence {
        Occurrence {
            adapter,
            start,
            end,
            sequence,
            alarm: None,
        }
    }

    /// An occurrence at the adapter's own span.
    pub(crate) fn from_adapter(adapter: &Arc<Adapter>, sequence: i64) -> Occurrence {
        Occurrence::new(adapter.clone(), adapter.start(), adapter.end(), sequence)
    }

    /// An alarm firing at `trigger` inside the given parent occurrence.
    pub(crate) fn alarm(trigger: Time, alarm: Component, parent: &Occurrence) -> Occurrence {
        Occurrence {
            adapter: parent.adapter.clone(),
            start: trigger,
            end: trigger,
            sequence: parent.sequence,
            alarm: Some(AlarmContext {
                alarm,
                parent_start: parent.start,
                parent_end: parent.end,
            }),
        }
    }

    pub fn component_name(&self) -> &'static str {
        self.adapter.component_name()
    }

    pub fn uid(&self) -> &str {
        self.adapter.uid()
    }

    /// Whether the given alarm component belongs to this occurrence's source.
    pub fn has_alarm(&self, alarm: &Component) -> bool {
        self.adapter.alarms().into_iter().any(|found| found == alarm)
    }

    pub fn is_in_span(&self, span_start: &Time, span_stop: &Time) -> Result<bool, Error> {
        time_span_contains_event(span_start, span_stop, &self.start, &self.end)
    }

    pub fn id(&self) -> OccurrenceId {
        OccurrenceId {
            name: self.adapter.component_name().to_string(),
            uid: self.adapter.uid().to_string(),
            recurrence_id: self.adapter.recurrence_ids().first().copied(),
            start: self.start,
        }
    }

    /// Materialize as a standalone component.
    pub fn as_component(&self, keep_recurrence_attributes: bool) -> Component {
        let mut copied = match &self.alarm {
            None => self
                .adapter
                .as_component(&self.start, &self.end, keep_recurrence_attributes),
            Some(context) => {
                let mut parent = self.adapter.as_component(
                    &context.parent_start,
                    &context.parent_end,
                    keep_recurrence_attributes,
                );
                let mut alarm_once = context.alarm.clone();
                alarm_once.set_date_time("TRIGGER", &self.start);
                alarm_once.set_integer("REPEAT", 0);
                parent.subcomponents = vec![alarm_once];
                parent
            }
        };
        if self.sequence >= 0 {
            copied.set_integer("SEQUENCE", self.sequence);
        }
        copied
    }
}

/// The stable identity of an occurrence:
/// `(component name, uid, recurrence id or none, start)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OccurrenceId {
    pub name: String,
    pub uid: String,
    pub recurrence_id: Option<RecurrenceId>,
    pub start: Time,
}

const ID_SEPARATOR: char = '#';
const RECURRENCE_ID_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl OccurrenceId {
    /// Parse the cursor format `NAME#RID_OR_EMPTY#START#UID`.
    ///
    /// The UID comes last because it is the only field that may contain the
    /// separator. A zoned start parses back as its UTC instant, which
    /// compares and hashes equal to the original.
    pub fn from_string(value: &str) -> Result<OccurrenceId, Error> {
        let mut parts = value.splitn(4, ID_SEPARATOR);
        let (name, recurrence_id, start, uid) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(name), Some(recurrence_id), Some(start), Some(uid)) => {
                (name, recurrence_id, start, uid)
            }
            _ => {
                return Err(Error::BadArgument(format!(
                    "cannot parse occurrence id {value:?}"
                )))
            }
        };

        let recurrence_id = if recurrence_id.is_empty() {
            None
        } else {
            Some(
                NaiveDateTime::parse_from_str(recurrence_id, RECURRENCE_ID_FORMAT).map_err(
                    |_| Error::BadArgument(format!("cannot parse occurrence id {value:?}")),
                )?,
            )
        };

        Ok(OccurrenceId {
            name: name.to_string(),
            uid: uid.to_string(),
            recurrence_id,
            start: parse_id_time(start).ok_or_else(|| {
                Error::BadArgument(format!("cannot parse occurrence id {value:?}"))
            })?,
        })
    }
}

fn parse_id_time(value: &str) -> Option<Time> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Time::Date(date));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, RECURRENCE_ID_FORMAT) {
        return Some(Time::Floating(dt));
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| Time::Zoned(dt.with_timezone(&Tz::UTC)))
}

fn render_id_time(time: &Time) -> String {
    match time {
        Time::Date(date) => date.format("%Y-%m-%d").to_string(),
        Time::Floating(dt) => dt.format(RECURRENCE_ID_FORMAT).to_string(),
        Time::Zoned(dt) => dt.to_rfc3339(),
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recurrence_id = self
            .recurrence_id
            .map(|rid| rid.format(RECURRENCE_ID_FORMAT).to_string())
            .unwrap_or_default();
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.name,
            recurrence_id,
            render_id_time(&self.start),
            self.uid,
            sep = ID_SEPARATOR,
        )
    }
}

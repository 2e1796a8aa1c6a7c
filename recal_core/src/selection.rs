use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use recal_ical::Component;

use crate::adapter::{synthetic_uid, Adapter, AdapterKind};
use crate::alarm_series::{AbsoluteAlarmSeries, RelativeAlarmSeries};
use crate::errors::{Error, ErrorKind};
use crate::series::{OccurrenceSource, Series};

/// A strategy that collects occurrence sources from a calendar tree.
pub trait SelectComponents: fmt::Debug + Send + Sync {
    /// Collect all sources. A series whose construction fails with a kind in
    /// `suppressed` is dropped; everything else is processed normally.
    fn collect_sources(
        &self,
        calendar: &Component,
        suppressed: &[ErrorKind],
    ) -> Result<Vec<Arc<dyn OccurrenceSource>>, Error>;
}

fn is_suppressed(error: &Error, suppressed: &[ErrorKind]) -> bool {
    suppressed.contains(&error.kind())
}

/// Group the components of one kind by UID and build a series per group.
fn collect_series(
    kind: AdapterKind,
    calendar: &Component,
    suppressed: &[ErrorKind],
) -> Result<Vec<Arc<Series>>, Error> {
    let mut groups: BTreeMap<String, Vec<&Component>> = BTreeMap::new();
    for component in calendar.walk(kind.component_name()) {
        let uid = component
            .property("UID")
            .map(|property| property.value.trim().to_string())
            .unwrap_or_else(synthetic_uid);
        groups.entry(uid).or_default().push(component);
    }

    let mut series_list = Vec::new();
    for (uid, components) in groups {
        let built = components
            .into_iter()
            .map(|component| {
                Adapter::new(kind, component.clone()).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()
            .and_then(Series::new);
        match built {
            Ok(series) => series_list.push(Arc::new(series)),
            Err(error) if is_suppressed(&error, suppressed) => {
                debug!(uid = uid.as_str(), %error, "dropping a bad series");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(series_list)
}

/// Select the series of one component kind by its iCalendar name.
///
/// `VALARM` is special: it delegates to [`AlarmSelection`].
#[derive(Debug, Clone)]
pub struct ComponentsWithName {
    name: String,
}

impl ComponentsWithName {
    pub fn new(name: &str) -> ComponentsWithName {
        ComponentsWithName {
            name: name.to_string(),
        }
    }
}

impl SelectComponents for ComponentsWithName {
    fn collect_sources(
        &self,
        calendar: &Component,
        suppressed: &[ErrorKind],
    ) -> Result<Vec<Arc<dyn OccurrenceSource>>, Error> {
        if self.name.eq_ignore_ascii_case("VALARM") {
            return AlarmSelection::default().collect_sources(calendar, suppressed);
        }
        let Some(kind) = AdapterKind::from_name(&self.name) else {
            return Err(Error::BadArgument(format!(
                "{:?} is an unknown name for a recurring component; \
                 known are VALARM, VEVENT, VJOURNAL and VTODO",
                self.name
            )));
        };
        Ok(collect_series(kind, calendar, suppressed)?
            .into_iter()
            .map(|series| series as Arc<dyn OccurrenceSource>)
            .collect())
    }
}

/// Select every known component kind, in a fixed name order.
#[derive(Debug, Clone, Default)]
pub struct AllKnownComponents;

impl SelectComponents for AllKnownComponents {
    fn collect_sources(
        &self,
        calendar: &Component,
        suppressed: &[ErrorKind],
    ) -> Result<Vec<Arc<dyn OccurrenceSource>>, Error> {
        let mut sources = Vec::new();
        for name in ["VALARM", "VEVENT", "VJOURNAL", "VTODO"] {
            sources.extend(ComponentsWithName::new(name).collect_sources(calendar, suppressed)?);
        }
        Ok(sources)
    }
}

/// Select the alarms of the parent component kinds (events and to-dos by
/// default) and derive their firing series.
#[derive(Debug, Clone)]
pub struct AlarmSelection {
    parents: Vec<AdapterKind>,
}

impl Default for AlarmSelection {
    fn default() -> AlarmSelection {
        AlarmSelection {
            parents: vec![AdapterKind::Event, AdapterKind::Todo],
        }
    }
}

impl AlarmSelection {
    pub fn new(parents: Vec<AdapterKind>) -> AlarmSelection {
        AlarmSelection { parents }
    }
}

/// Whether a TRIGGER value is a duration (relative alarm) or a datetime.
fn trigger_is_relative(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with('P')
        || trimmed.starts_with("-P")
        || trimmed.starts_with("+P")
}

impl SelectComponents for AlarmSelection {
    fn collect_sources(
        &self,
        calendar: &Component,
        suppressed: &[ErrorKind],
    ) -> Result<Vec<Arc<dyn OccurrenceSource>>, Error> {
        let mut absolute = AbsoluteAlarmSeries::new();
        let mut sources: Vec<Arc<dyn OccurrenceSource>> = Vec::new();

        for kind in &self.parents {
            for series in collect_series(*kind, calendar, suppressed)? {
                // the same alarm may be cloned into several modifications;
                // it is computed once
                let mut used: Vec<Component> = Vec::new();
                for adapter in series.components() {
                    for alarm in adapter.alarms() {
                        let Some(trigger) = alarm.property("TRIGGER") else {
                            continue;
                        };
                        if used.iter().any(|known| known == alarm) {
                            continue;
                        }

                        let added = if trigger_is_relative(&trigger.value) {
                            let relative_to_end = trigger
                                .param("RELATED")
                                .map(|related| related.eq_ignore_ascii_case("END"))
                                .unwrap_or(false);
                            RelativeAlarmSeries::new(
                                alarm.clone(),
                                series.clone(),
                                relative_to_end,
                            )
                            .map(|relative| {
                                sources.push(Arc::new(relative) as Arc<dyn OccurrenceSource>);
                            })
                        } else {
                            absolute.add(alarm, adapter, series.sequence())
                        };

                        match added {
                            Ok(()) => used.push(alarm.clone()),
                            Err(error) if is_suppressed(&error, suppressed) => {
                                debug!(%error, "dropping a bad alarm");
                            }
                            Err(error) => return Err(error),
                        }
                    }
                }
            }
        }

        if !absolute.is_empty() {
            sources.push(Arc::new(absolute));
        }
        Ok(sources)
    }
}

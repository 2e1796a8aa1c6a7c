use std::fmt;

use crate::values::{
    parse_date_time_value, parse_duration_value, parse_integer_value, parse_period_value,
    render_date_time_value, PeriodEnd, Time,
};
use crate::ValueError;

use chrono_tz::Tz;

/// A property parameter, e.g. `TZID=Europe/Berlin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: &str, value: &str) -> Param {
        Param {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A single content line: name, parameters and the raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub params: Vec<Param>,
    pub value: String,
}

impl Property {
    pub fn new(name: &str, value: &str) -> Property {
        Property {
            name: name.to_string(),
            params: Vec::new(),
            value: value.to_string(),
        }
    }

    /// Build a DATE/DATE-TIME property with the parameters the value shape requires.
    pub fn date_time(name: &str, time: &Time) -> Property {
        let mut property = Property::new(name, &render_date_time_value(time));
        match time {
            Time::Date(_) => property.params.push(Param::new("VALUE", "DATE")),
            Time::Zoned(dt) if dt.timezone() != Tz::UTC => {
                property.params.push(Param::new("TZID", dt.timezone().name()));
            }
            _ => {}
        }
        property
    }

    pub fn integer(name: &str, value: i64) -> Property {
        Property::new(name, &value.to_string())
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|param| param.key.eq_ignore_ascii_case(key))
            .map(|param| param.value.as_str())
    }

    pub fn tzid(&self) -> Option<&str> {
        self.param("TZID")
    }

    fn is_date_value(&self) -> bool {
        self.param("VALUE") == Some("DATE")
    }

    pub fn is_period_value(&self) -> bool {
        self.param("VALUE") == Some("PERIOD")
    }

    pub fn as_date_time(&self) -> Result<Time, ValueError> {
        parse_date_time_value(&self.value, self.tzid(), self.is_date_value())
    }

    /// Comma-separated DATE/DATE-TIME list (EXDATE, RDATE).
    pub fn as_date_times(&self) -> Result<Vec<Time>, ValueError> {
        self.value
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_date_time_value(part, self.tzid(), self.is_date_value()))
            .collect()
    }

    /// Comma-separated PERIOD list (RDATE;VALUE=PERIOD).
    pub fn as_periods(&self) -> Result<Vec<(Time, PeriodEnd)>, ValueError> {
        self.value
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_period_value(part, self.tzid()))
            .collect()
    }

    pub fn as_duration(&self) -> Result<chrono::Duration, ValueError> {
        parse_duration_value(&self.value)
    }

    pub fn as_integer(&self) -> Result<i64, ValueError> {
        parse_integer_value(&self.value)
    }

    fn render(&self) -> String {
        let mut line = self.name.clone();
        for param in &self.params {
            line.push(';');
            line.push_str(&param.key);
            line.push('=');
            if param.value.contains([':', ';', ',']) {
                line.push('"');
                line.push_str(&param.value);
                line.push('"');
            } else {
                line.push_str(&param.value);
            }
        }
        line.push(':');
        line.push_str(&self.value);
        line
    }

    fn from_parser(property: &icalendar::parser::Property<'_>) -> Property {
        Property {
            name: property.name.to_string(),
            params: property
                .params
                .iter()
                .map(|param| Param {
                    key: param.key.to_string(),
                    value: param
                        .val
                        .as_ref()
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                })
                .collect(),
            value: property.val.to_string(),
        }
    }
}

/// An owned iCalendar component tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<Property>,
    pub subcomponents: Vec<Component>,
}

impl Component {
    pub fn new(name: &str) -> Component {
        Component {
            name: name.to_string(),
            properties: Vec::new(),
            subcomponents: Vec::new(),
        }
    }

    /// This component and all descendants with the given name.
    pub fn walk(&self, name: &str) -> Vec<&Component> {
        let mut found = Vec::new();
        self.walk_into(name, &mut found);
        found
    }

    fn walk_into<'a>(&'a self, name: &str, found: &mut Vec<&'a Component>) {
        if self.name.eq_ignore_ascii_case(name) {
            found.push(self);
        }
        for component in &self.subcomponents {
            component.walk_into(name, found);
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }

    pub fn properties_named(&self, name: &str) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|property| property.name.eq_ignore_ascii_case(name))
            .collect()
    }

    pub fn push_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Replace every property of this name with the given one.
    pub fn set_property(&mut self, property: Property) {
        self.remove_properties(&property.name);
        self.properties.push(property);
    }

    pub fn remove_properties(&mut self, name: &str) {
        self.properties
            .retain(|property| !property.name.eq_ignore_ascii_case(name));
    }

    pub fn set_date_time(&mut self, name: &str, time: &Time) {
        self.set_property(Property::date_time(name, time));
    }

    pub fn set_integer(&mut self, name: &str, value: i64) {
        self.set_property(Property::integer(name, value));
    }

    fn from_parser(component: &icalendar::parser::Component<'_>) -> Component {
        Component {
            name: component.name.to_string(),
            properties: component
                .properties
                .iter()
                .map(Property::from_parser)
                .collect(),
            subcomponents: component
                .components
                .iter()
                .map(Component::from_parser)
                .collect(),
        }
    }

    fn write_to(&self, out: &mut String) {
        fold_line(&format!("BEGIN:{}", self.name), out);
        for property in &self.properties {
            fold_line(&property.render(), out);
        }
        for component in &self.subcomponents {
            component.write_to(out);
        }
        fold_line(&format!("END:{}", self.name), out);
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

/// Fold a content line at 75 octets, continuing with CRLF + space.
fn fold_line(line: &str, out: &mut String) {
    const LIMIT: usize = 75;
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out.push_str("\r\n");
}

/// Read iCalendar text into an owned component tree.
pub fn parse_calendar(text: &str) -> Result<Component, ValueError> {
    let unfolded = icalendar::parser::unfold(text);
    let calendar = icalendar::parser::read_calendar(&unfolded)
        .map_err(|message| ValueError::CalendarSyntax(message.to_string()))?;

    let mut root = Component::new("VCALENDAR");
    root.properties = calendar
        .properties
        .iter()
        .map(Property::from_parser)
        .collect();
    root.subcomponents = calendar
        .components
        .iter()
        .map(Component::from_parser)
        .collect();
    Ok(root)
}

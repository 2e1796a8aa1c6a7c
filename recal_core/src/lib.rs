mod adapter;
mod alarm_series;
mod errors;
mod occurrence;
mod pages;
mod query;
mod rule_set;
mod selection;
mod series;
mod time;

pub use adapter::*;
pub use alarm_series::*;
pub use errors::*;
pub use occurrence::*;
pub use pages::*;
pub use query::*;
pub use rule_set::*;
pub use selection::*;
pub use series::*;
pub use time::*;

pub use recal_ical::{parse_calendar, Component, Param, PeriodEnd, Property, Time, ValueError};

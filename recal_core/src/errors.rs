use recal_ical::{Time, ValueError};
use thiserror::Error;

/// Everything that can go wrong while expanding a calendar.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A calendar-level precondition failed. Never suppressed.
    #[error("invalid calendar: {0}")]
    InvalidCalendar(String),

    /// A component or a caller-supplied span ends before it starts.
    #[error("the period must start before it ends (start: {start:?}, end: {end:?})")]
    PeriodEndBeforeStart { start: Time, end: Time },

    /// An RRULE string could not be turned into something the rule engine accepts.
    #[error("{message}: {rule}")]
    BadRuleStringFormat { message: String, rule: String },

    /// A property value could not be decoded.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A caller argument was malformed (date input, page size, page id).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// `first` was called on a calendar without any occurrence.
    #[error("no occurrence found")]
    NoOccurrence,
}

/// The kind of an [`Error`], used for the suppression set of `skip_bad_series`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCalendar,
    PeriodEndBeforeStart,
    BadRuleStringFormat,
    Value,
    BadArgument,
    NoOccurrence,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCalendar(_) => ErrorKind::InvalidCalendar,
            Error::PeriodEndBeforeStart { .. } => ErrorKind::PeriodEndBeforeStart,
            Error::BadRuleStringFormat { .. } => ErrorKind::BadRuleStringFormat,
            Error::Value(_) => ErrorKind::Value,
            Error::BadArgument(_) => ErrorKind::BadArgument,
            Error::NoOccurrence => ErrorKind::NoOccurrence,
        }
    }
}

/// The error kinds a query drops per series when `skip_bad_series` is set.
pub const SUPPRESSIBLE_ERRORS: &[ErrorKind] = &[
    ErrorKind::BadRuleStringFormat,
    ErrorKind::PeriodEndBeforeStart,
    ErrorKind::Value,
];

use thiserror::Error;

/// Errors produced while decoding property values or reading calendar text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("cannot read calendar text: {0}")]
    CalendarSyntax(String),

    #[error("cannot decode {value:?} as a DATE or DATE-TIME value")]
    BadDateTime { value: String },

    #[error("unknown time zone identifier {tzid:?}")]
    UnknownTimeZone { tzid: String },

    #[error("cannot decode {value:?} as a DURATION value")]
    BadDuration { value: String },

    #[error("cannot decode {value:?} as a PERIOD value")]
    BadPeriod { value: String },

    #[error("cannot decode {value:?} as an integer value")]
    BadInteger { value: String },
}

use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::telegram::Obis;

/// Failure to decode a single value of a telegram field.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown unit {found:?}, expected {expected:?}")]
    UnknownUnit {
        expected: &'static str,
        found: String,
    },

    #[error("malformed number {value:?}")]
    MalformedNumber {
        value: String,
        #[source]
        source: NumberError,
    },

    #[error("unknown {kind} {value}")]
    UnknownState { kind: &'static str, value: i64 },

    #[error("invalid timestamp season {0:?}")]
    InvalidSeason(String),

    #[error("invalid timestamp {value:?}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: Option<chrono::ParseError>,
    },

    #[error("missing value #{index}")]
    MissingValue { index: usize },
}

#[derive(Debug, Error)]
pub enum NumberError {
    #[error(transparent)]
    Float(#[from] ParseFloatError),

    #[error(transparent)]
    Int(#[from] ParseIntError),

    #[error("not a finite number")]
    NotFinite,
}

/// A telegram that could only be partially applied. Fields before `obis`
/// were applied, the rest of the telegram was skipped.
#[derive(Debug, Error)]
#[error("failed to decode {obis}")]
pub struct RecordError {
    pub obis: Obis,
    #[source]
    pub source: DecodeError,
}

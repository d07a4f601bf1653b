//! Row and record types
//!
//! A [`RawRow`] is what the parser produces: header name to raw text. An
//! [`EventRecord`] is the typed, insert-ready form of a row that already
//! passed validation.

use crate::validation::EventField;
use chrono::NaiveDateTime;
use sqlx::types::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Format of `eventDatetime`
pub const EVENT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the `eventAction` column
pub const MAX_EVENT_ACTION_LEN: usize = 20;

/// One data row keyed by header name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    line: u64,
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// 1-based line number in the source file
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, field: EventField) -> Option<&str> {
        self.fields.get(field.name()).map(String::as_str)
    }
}

/// A validated row could not be turned into column values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("{0} is missing")]
    Missing(EventField),

    #[error("eventDatetime {0:?} is not a real calendar time")]
    Datetime(String),

    #[error("eventAction {0:?} is longer than 20 characters")]
    ActionTooLong(String),

    #[error("callRef {0:?} does not fit a 64-bit integer")]
    CallRef(String),

    #[error("eventValue {0:?} is not a number")]
    Value(String),
}

/// Insert-ready event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_datetime: NaiveDateTime,
    pub event_action: String,
    pub call_ref: i64,
    pub event_value: Option<BigDecimal>,
    pub event_currency_code: Option<String>,
}

impl EventRecord {
    /// Type the columns of a row that passed [`crate::validation::RowValidator`]
    ///
    /// Value and currency are only carried when `eventValue` is non-empty;
    /// otherwise both are stored as NULL whatever the currency column holds.
    pub fn from_row(row: &RawRow) -> Result<Self, ConversionError> {
        let datetime = require(row, EventField::EventDatetime)?;
        let event_datetime = NaiveDateTime::parse_from_str(datetime, EVENT_DATETIME_FORMAT)
            .map_err(|_| ConversionError::Datetime(datetime.to_string()))?;

        let event_action = require(row, EventField::EventAction)?;
        if event_action.chars().count() > MAX_EVENT_ACTION_LEN {
            return Err(ConversionError::ActionTooLong(event_action.to_string()));
        }

        let call_ref = require(row, EventField::CallRef)?;
        let call_ref = call_ref
            .parse::<i64>()
            .map_err(|_| ConversionError::CallRef(call_ref.to_string()))?;

        let (event_value, event_currency_code) = match row.get(EventField::EventValue) {
            Some(value) if !value.is_empty() => {
                let currency = require(row, EventField::EventCurrencyCode)?;
                (Some(parse_decimal(value)?), Some(currency.to_string()))
            },
            _ => (None, None),
        };

        Ok(Self {
            event_datetime,
            event_action: event_action.to_string(),
            call_ref,
            event_value,
            event_currency_code,
        })
    }
}

fn require(row: &RawRow, field: EventField) -> Result<&str, ConversionError> {
    row.get(field).ok_or(ConversionError::Missing(field))
}

/// `12.` and `.5` are well-formed event values; a lone `.` is not a number.
fn parse_decimal(value: &str) -> Result<BigDecimal, ConversionError> {
    let (whole, fraction) = value
        .split_once('.')
        .ok_or_else(|| ConversionError::Value(value.to_string()))?;
    if whole.is_empty() && fraction.is_empty() {
        return Err(ConversionError::Value(value.to_string()));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    BigDecimal::from_str(&format!("{}.{}", whole, fraction))
        .map_err(|_| ConversionError::Value(value.to_string()))
}

//! Field and row validation
//!
//! Every rule works on the raw text of a field exactly as it was read from the
//! input file. Nothing is trimmed or cast before a rule sees it.
//!
//! | Field | Rule |
//! |---|---|
//! | `eventDatetime` | `^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}$` |
//! | `eventAction` | `[a-z]{1,20}$` (no start anchor) |
//! | `callRef` | `^[0-9]+$` |
//! | `eventValue` | `^[0-9]*\.[0-9]*$`, only when non-empty |
//! | `eventCurrencyCode` | member of [`CURRENCY_CODES`], only when `eventValue` is non-empty |
//!
//! `eventAction` has no start anchor: any prefix passes as long as the value
//! ends in 1-20 lowercase letters.

use crate::error::IngestError;
use crate::record::RawRow;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// ISO 4217 codes accepted for `eventCurrencyCode`
///
/// Circulating currencies only: fund codes, precious metals and the
/// testing/no-currency codes (`XTS`, `XXX`) are excluded.
pub const CURRENCY_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD", "CAD",
    "CDF", "CHF", "CLP", "CNY", "COP", "CRC", "CUC", "CUP", "CVE", "CZK", "DJF", "DKK", "DOP",
    "DZD", "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL", "GHS", "GIP", "GMD", "GNF",
    "GTQ", "GYD", "HKD", "HNL", "HRK", "HTG", "HUF", "IDR", "ILS", "INR", "IQD", "IRR", "ISK",
    "JMD", "JOD", "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK",
    "LBP", "LKR", "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRU",
    "MUR", "MVR", "MWK", "MXN", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK", "NPR", "NZD", "OMR",
    "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON", "RSD", "RUB", "RWF", "SAR",
    "SBD", "SCR", "SDG", "SEK", "SGD", "SHP", "SLE", "SLL", "SOS", "SRD", "SSP", "STN", "SVC",
    "SYP", "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX",
    "USD", "UYU", "UZS", "VES", "VND", "VUV", "WST", "XAF", "XCD", "XOF", "XPF", "YER", "ZAR",
    "ZMW", "ZWL",
];

// Patterns are compile-time constants.
#[allow(clippy::expect_used)]
static DATETIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}$")
        .expect("valid datetime pattern")
});

#[allow(clippy::expect_used)]
static ACTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]{1,20}$").expect("valid action pattern"));

#[allow(clippy::expect_used)]
static CALL_REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid call ref pattern"));

#[allow(clippy::expect_used)]
static VALUE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]*\.[0-9]*$").expect("valid value pattern"));

/// `eventDatetime` must look like `YYYY-MM-DD HH:MM:SS`
pub fn is_valid_event_datetime(value: &str) -> bool {
    DATETIME_PATTERN.is_match(value)
}

/// `eventAction` must end in 1-20 lowercase ASCII letters
pub fn is_valid_event_action(value: &str) -> bool {
    ACTION_PATTERN.is_match(value)
}

/// `callRef` must be one or more ASCII digits
pub fn is_valid_call_ref(value: &str) -> bool {
    CALL_REF_PATTERN.is_match(value)
}

/// `eventValue` must contain exactly one dot with optional digits around it
pub fn is_valid_event_value(value: &str) -> bool {
    VALUE_PATTERN.is_match(value)
}

/// `eventCurrencyCode` must be one of [`CURRENCY_CODES`], case-sensitive
pub fn is_valid_currency_code(value: &str) -> bool {
    CURRENCY_CODES.contains(&value)
}

/// The columns an event record is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    EventDatetime,
    EventAction,
    CallRef,
    EventValue,
    EventCurrencyCode,
}

impl EventField {
    /// All fields in table column order
    pub const ALL: [EventField; 5] = [
        EventField::EventDatetime,
        EventField::EventAction,
        EventField::CallRef,
        EventField::EventValue,
        EventField::EventCurrencyCode,
    ];

    /// Checked on every row
    pub const REQUIRED: [EventField; 3] = [
        EventField::EventDatetime,
        EventField::EventAction,
        EventField::CallRef,
    ];

    /// Checked only when `eventValue` is present and non-empty
    pub const CONDITIONAL: [EventField; 2] = [EventField::EventValue, EventField::EventCurrencyCode];

    /// Header / column name
    pub fn name(self) -> &'static str {
        match self {
            EventField::EventDatetime => "eventDatetime",
            EventField::EventAction => "eventAction",
            EventField::CallRef => "callRef",
            EventField::EventValue => "eventValue",
            EventField::EventCurrencyCode => "eventCurrencyCode",
        }
    }

    /// The rule applied to this field's raw text
    pub fn validator(self) -> fn(&str) -> bool {
        match self {
            EventField::EventDatetime => is_valid_event_datetime,
            EventField::EventAction => is_valid_event_action,
            EventField::CallRef => is_valid_call_ref,
            EventField::EventValue => is_valid_event_value,
            EventField::EventCurrencyCode => is_valid_currency_code,
        }
    }

    /// Apply this field's rule to a raw value
    pub fn is_valid(self, value: &str) -> bool {
        (self.validator())(value)
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EventField {
    type Err = IngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| IngestError::UnknownField(s.to_string()))
    }
}

/// Why a single field failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFailure {
    /// The column is absent from the row
    Missing(EventField),
    /// The column is present but its text breaks the field's rule
    Invalid { field: EventField, value: String },
}

impl FieldFailure {
    pub fn field(&self) -> EventField {
        match self {
            FieldFailure::Missing(field) => *field,
            FieldFailure::Invalid { field, .. } => *field,
        }
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldFailure::Missing(field) => write!(f, "{} is missing", field),
            FieldFailure::Invalid { field, value } => write!(f, "{} is invalid: {:?}", field, value),
        }
    }
}

/// Outcome of validating one row: every failing check, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub failures: Vec<FieldFailure>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure reasons joined for a single log line
    pub fn reasons(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Accept/reject decision over a whole row
#[derive(Debug, Clone, Copy, Default)]
pub struct RowValidator;

impl RowValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every applicable check without short-circuiting
    pub fn validate(&self, row: &RawRow) -> ValidationReport {
        let mut report = ValidationReport::default();

        for field in EventField::REQUIRED {
            check_field(row, field, &mut report);
        }

        if row.get(EventField::EventValue).is_some_and(|value| !value.is_empty()) {
            for field in EventField::CONDITIONAL {
                check_field(row, field, &mut report);
            }
        }

        report
    }

    pub fn is_valid(&self, row: &RawRow) -> bool {
        self.validate(row).is_valid()
    }
}

fn check_field(row: &RawRow, field: EventField, report: &mut ValidationReport) {
    match row.get(field) {
        None => report.failures.push(FieldFailure::Missing(field)),
        Some(value) if !field.is_valid(value) => report.failures.push(FieldFailure::Invalid {
            field,
            value: value.to_string(),
        }),
        Some(_) => {},
    }
}

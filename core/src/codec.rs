//! JSON codec with a configurable date representation.
//!
//! # Design
//! serde picks a representation per type, not per decoder. To let a decoder
//! decide how dates look on the wire, `Date` consults a thread-local
//! `DateStrategy` that `JsonDecoder::decode` and `JsonEncoder::encode` install
//! for the duration of one synchronous serde call and restore on exit.
//! Outside such a call `Date` reads and writes RFC 3339.

use std::cell::RefCell;
use std::fmt::{self, Write as _};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

thread_local! {
    static ACTIVE_STRATEGY: RefCell<Option<DateStrategy>> = const { RefCell::new(None) };
}

/// How `Date` values are represented in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DateStrategy {
    /// RFC 3339 strings, e.g. `2020-11-05T10:00:00Z`.
    #[default]
    Iso8601,
    /// Seconds since the Unix epoch, possibly fractional.
    SecondsSince1970,
    MillisecondsSince1970,
    /// Strings in a chrono `strftime` format, e.g. `%Y-%m-%d`.
    Formatted(String),
}

impl DateStrategy {
    pub fn formatted(format: impl Into<String>) -> Self {
        DateStrategy::Formatted(format.into())
    }

    fn parse_str(&self, s: &str) -> Result<DateTime<Utc>, String> {
        match self {
            DateStrategy::Iso8601 => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("invalid RFC 3339 date {s:?}: {e}")),
            DateStrategy::Formatted(format) => parse_formatted(s, format),
            DateStrategy::SecondsSince1970 | DateStrategy::MillisecondsSince1970 => {
                Err(format!("expected a numeric timestamp, found string {s:?}"))
            }
        }
    }

    fn parse_number(&self, n: f64) -> Result<DateTime<Utc>, String> {
        let parsed = match self {
            DateStrategy::SecondsSince1970 => {
                let secs = n.floor();
                let nanos = ((n - secs) * 1e9).round().min(999_999_999.0) as u32;
                DateTime::from_timestamp(secs as i64, nanos)
            }
            DateStrategy::MillisecondsSince1970 => DateTime::from_timestamp_millis(n.round() as i64),
            DateStrategy::Iso8601 | DateStrategy::Formatted(_) => {
                return Err(format!("expected a date string, found number {n}"));
            }
        };
        parsed.ok_or_else(|| format!("timestamp {n} out of range"))
    }
}

fn parse_formatted(s: &str, format: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(s, format)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, format).map(|n| Utc.from_utc_datetime(&n)))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, format)
                .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        })
        .map_err(|e| format!("date {s:?} does not match format {format:?}: {e}"))
}

fn active_strategy() -> DateStrategy {
    ACTIVE_STRATEGY
        .with(|active| active.borrow().clone())
        .unwrap_or_default()
}

/// Installs a strategy on the current thread until dropped.
struct StrategyScope {
    previous: Option<DateStrategy>,
}

impl StrategyScope {
    fn enter(strategy: Option<DateStrategy>) -> Self {
        let previous = ACTIVE_STRATEGY.with(|active| active.replace(strategy));
        Self { previous }
    }
}

impl Drop for StrategyScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_STRATEGY.with(|active| *active.borrow_mut() = previous);
    }
}

/// A UTC instant whose JSON form follows the active `DateStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(pub DateTime<Utc>);

impl Date {
    /// Midnight UTC on the given calendar day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| Date(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))))
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Date(dt)
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match active_strategy() {
            DateStrategy::Iso8601 => {
                serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            DateStrategy::SecondsSince1970 => {
                if self.0.timestamp_subsec_nanos() == 0 {
                    serializer.serialize_i64(self.0.timestamp())
                } else {
                    let secs = self.0.timestamp() as f64
                        + f64::from(self.0.timestamp_subsec_nanos()) / 1e9;
                    serializer.serialize_f64(secs)
                }
            }
            DateStrategy::MillisecondsSince1970 => serializer.serialize_i64(self.0.timestamp_millis()),
            DateStrategy::Formatted(format) => {
                let mut out = String::new();
                write!(out, "{}", self.0.format(&format)).map_err(|_| {
                    <S::Error as serde::ser::Error>::custom(format!("invalid date format {format:?}"))
                })?;
                serializer.serialize_str(&out)
            }
        }
    }
}

struct DateVisitor(DateStrategy);

impl Visitor<'_> for DateVisitor {
    type Value = Date;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a date encoded as {:?}", self.0)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Date, E> {
        self.0.parse_str(v).map(Date).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Date, E> {
        self.0.parse_number(v as f64).map(Date).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Date, E> {
        self.0.parse_number(v as f64).map(Date).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Date, E> {
        self.0.parse_number(v).map(Date).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DateVisitor(active_strategy()))
    }
}

/// Decodes JSON response bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonDecoder {
    date_strategy: Option<DateStrategy>,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_strategy(mut self, strategy: DateStrategy) -> Self {
        self.date_strategy = Some(strategy);
        self
    }

    pub fn date_strategy(&self) -> Option<&DateStrategy> {
        self.date_strategy.as_ref()
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        let _scope = StrategyScope::enter(self.date_strategy.clone());
        serde_json::from_slice(bytes)
    }
}

/// Encodes values with the same date rules as `JsonDecoder`.
///
/// Endpoint bodies are plain JSON maps, so dates reach a body by converting
/// with `to_value` first and passing the object to
/// `Endpoint::with_body_parameters`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonEncoder {
    date_strategy: Option<DateStrategy>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_strategy(mut self, strategy: DateStrategy) -> Self {
        self.date_strategy = Some(strategy);
        self
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, serde_json::Error> {
        let _scope = StrategyScope::enter(self.date_strategy.clone());
        serde_json::to_vec(value)
    }

    pub fn to_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<serde_json::Value, serde_json::Error> {
        let _scope = StrategyScope::enter(self.date_strategy.clone());
        serde_json::to_value(value)
    }
}

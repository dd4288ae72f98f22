//! Mapping free-form upstream values onto a fixed vocabulary.
//!
//! Everything here is pure: no I/O, no clock reads beyond the local
//! timezone used for offset-less date strings.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{self, Record};

/// Numbers below this are epoch seconds, at or above it epoch milliseconds.
pub const SECONDS_THRESHOLD: f64 = 1e12;

const SUCCESS_TOKENS: &[&str] = &["通过", "成功", "success"];
const FAILURE_TOKENS: &[&str] = &["失败", "错误", "error"];

/// Splits delimiter-separated package name lists (whitespace also splits).
const PACKAGE_DELIMITERS: &[char] = &[',', '，', ';', '；', '、'];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedStatus {
    Passed,
    Failed,
    Other,
}

impl std::fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizedStatus::Passed => write!(f, "passed"),
            NormalizedStatus::Failed => write!(f, "failed"),
            NormalizedStatus::Other => write!(f, "other"),
        }
    }
}

/// Milliseconds since the Unix epoch. Unresolved timestamps are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMs(pub i64);

impl TimestampMs {
    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimestampMs {
    fn from(dt: DateTime<Tz>) -> Self {
        Self(dt.timestamp_millis())
    }
}

/// Case-insensitive status classification.
pub fn normalize_status(raw: Option<&str>) -> NormalizedStatus {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NormalizedStatus::Other;
    };
    let folded = raw.to_lowercase();

    if folded.contains("pass") || SUCCESS_TOKENS.contains(&folded.as_str()) {
        NormalizedStatus::Passed
    } else if folded.contains("fail") || FAILURE_TOKENS.contains(&folded.as_str()) {
        NormalizedStatus::Failed
    } else {
        NormalizedStatus::Other
    }
}

/// Status of a record via the status fallback chain.
pub fn record_status(record: &Record) -> NormalizedStatus {
    normalize_status(record.text(&record::STATUS).as_deref())
}

/// Raw end-time value: end, finish, completion, last update, start, creation.
pub fn resolve_end_time(record: &Record) -> Option<&Value> {
    record.lookup(&record::END_TIME)
}

/// Raw start-time value: start, begin, started-at, creation.
pub fn resolve_start_time(record: &Record) -> Option<&Value> {
    record.lookup(&record::START_TIME)
}

/// Raw creation-time value of a project.
pub fn resolve_created_at(record: &Record) -> Option<&Value> {
    record.lookup(&record::CREATED_AT)
}

pub fn end_time_ms(record: &Record) -> Option<TimestampMs> {
    resolve_end_time(record).and_then(to_timestamp_ms)
}

pub fn start_time_ms(record: &Record) -> Option<TimestampMs> {
    resolve_start_time(record).and_then(to_timestamp_ms)
}

pub fn created_at_ms(record: &Record) -> Option<TimestampMs> {
    resolve_created_at(record).and_then(to_timestamp_ms)
}

/// Interpret an upstream timestamp.
///
/// Numbers below 10^12 are epoch seconds, otherwise epoch milliseconds.
/// Strings go through [`parse_date_str`]. Anything else is unresolved.
pub fn to_timestamp_ms(value: &Value) -> Option<TimestampMs> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64().filter(|f| f.is_finite())?;
            let ms = if n < SECONDS_THRESHOLD { n * 1000.0 } else { n };
            Some(TimestampMs(ms.round() as i64))
        }
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

/// General-purpose date parsing for the string shapes the backend emits.
///
/// Strings without an offset are read as local time, except bare ISO dates
/// which are UTC midnight.
pub fn parse_date_str(raw: &str) -> Option<TimestampMs> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.into());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.into());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.into());
        }
    }

    let utc_body = strip_suffix_ignore_case(s, " UTC")
        .or_else(|| strip_suffix_ignore_case(s, " GMT"))
        .or_else(|| s.strip_suffix('Z'))
        .or_else(|| s.strip_suffix('z'));
    if let Some(body) = utc_body {
        return parse_naive(body.trim_end()).map(|naive| naive.and_utc().into());
    }

    if let Some(naive) = parse_naive(s) {
        return Local.from_local_datetime(&naive).earliest().map(Into::into);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc().into());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(Into::into);
    }

    None
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

/// Package names of a project, whatever shape the field arrived in.
///
/// Sequences keep each non-blank element, strings are tried as a JSON array
/// and otherwise split on [`PACKAGE_DELIMITERS`] and whitespace. Duplicates
/// are dropped, first occurrence wins.
pub fn parse_package_names(value: Option<&Value>) -> Vec<String> {
    let names = match value {
        None | Some(Value::Null) | Some(Value::Object(_)) => Vec::new(),
        Some(Value::Array(items)) => from_elements(items),
        Some(Value::String(s)) => parse_package_str(s),
        Some(other) => record::value_text(other).into_iter().collect(),
    };
    dedup(names)
}

/// Package names of a project via the package-name fallback chain.
pub fn project_package_names(record: &Record) -> Vec<String> {
    parse_package_names(record.lookup(&record::PACKAGE_NAMES))
}

fn parse_package_str(raw: &str) -> Vec<String> {
    let s = raw.trim();
    if s.is_empty() {
        return Vec::new();
    }
    if s.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
            return from_elements(&items);
        }
    }
    s.split(|c: char| PACKAGE_DELIMITERS.contains(&c) || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn from_elements(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(record::value_text).collect()
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

//! Per-dataset choice between UTC and local calendar days.
//!
//! Upstream timestamp strings carry timezone markers inconsistently, so the
//! frame is inferred from a sample of the dataset rather than per record.
//! This is a heuristic: a mixed dataset sitting near the threshold can flip
//! frames between refreshes and make "today" counts jitter.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use super::normalize::{self, TimestampMs};
use super::record::Record;

/// How many timestamp-bearing records are inspected.
pub const SAMPLE_SIZE: usize = 20;

/// Fraction of UTC-tagged samples at which the whole dataset is read as UTC.
pub const UTC_THRESHOLD: f64 = 0.5;

const DAY_MS: i64 = 86_400_000;

/// Which calendar days a dataset is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    Utc,
    Local,
}

/// One calendar day as an inclusive millisecond range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DayWindow {
    pub fn contains(&self, ts: TimestampMs) -> bool {
        (self.start_ms..=self.end_ms).contains(&ts.as_millis())
    }
}

/// Whether a raw timestamp string states it is UTC.
pub fn is_utc_tagged(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let upper = s.to_uppercase();
    upper.contains('Z') || upper.contains("GMT") || upper.contains("+00:00") || upper.ends_with(" UTC")
}

impl DayBoundary {
    /// Decide from raw timestamp values, in dataset order.
    ///
    /// Only values that resolve to a timestamp are sampled. An empty sample
    /// means local time.
    pub fn infer<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut sampled = 0usize;
        let mut tagged = 0usize;
        for value in values
            .into_iter()
            .filter(|v| normalize::to_timestamp_ms(v).is_some())
            .take(SAMPLE_SIZE)
        {
            sampled += 1;
            if is_utc_tagged(value) {
                tagged += 1;
            }
        }

        if sampled == 0 {
            return DayBoundary::Local;
        }
        if tagged as f64 / sampled as f64 >= UTC_THRESHOLD {
            DayBoundary::Utc
        } else {
            DayBoundary::Local
        }
    }

    /// Frame for execution records, judged on their end times.
    pub fn for_executions(records: &[Record]) -> Self {
        Self::infer(records.iter().filter_map(normalize::resolve_end_time))
    }

    /// Frame for projects, judged on their creation times.
    pub fn for_projects(projects: &[Record]) -> Self {
        Self::infer(projects.iter().filter_map(normalize::resolve_created_at))
    }

    /// Calendar date of `reference` in this frame.
    pub fn date_of(self, reference: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Utc => reference.date_naive(),
            DayBoundary::Local => reference.with_timezone(&Local).date_naive(),
        }
    }

    /// Window of the calendar date `date` in this frame.
    pub fn window_for(self, date: NaiveDate) -> DayWindow {
        match self {
            DayBoundary::Utc => day_window_in(&Utc, date),
            DayBoundary::Local => day_window_in(&Local, date),
        }
    }

    /// Window of the day containing `reference`.
    pub fn day_window(self, reference: DateTime<Utc>) -> DayWindow {
        self.window_for(self.date_of(reference))
    }

    /// The `days` calendar days ending with the reference day, oldest first.
    pub fn trailing_days(self, reference: DateTime<Utc>, days: u32) -> Vec<(NaiveDate, DayWindow)> {
        trailing_dates(self.date_of(reference), days)
            .into_iter()
            .map(|date| (date, self.window_for(date)))
            .collect()
    }
}

/// Like [`DayBoundary::trailing_days`], with windows in an explicit zone.
pub fn trailing_days_in<Tz: TimeZone>(tz: &Tz, today: NaiveDate, days: u32) -> Vec<(NaiveDate, DayWindow)> {
    trailing_dates(today, days)
        .into_iter()
        .map(|date| (date, day_window_in(tz, date)))
        .collect()
}

fn trailing_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .map(|back| {
            today
                .checked_sub_days(Days::new(u64::from(back)))
                .unwrap_or(NaiveDate::MIN)
        })
        .collect()
}

/// [midnight, next midnight - 1ms] of `date` in `tz`.
pub fn day_window_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DayWindow {
    let start_ms = midnight_ms(tz, date);
    let end_ms = match date.succ_opt() {
        Some(next) => midnight_ms(tz, next) - 1,
        None => start_ms + DAY_MS - 1,
    };
    DayWindow { start_ms, end_ms }
}

fn midnight_ms<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.timestamp_millis();
    }
    // Midnight skipped by a DST jump: the day starts at the first valid hour.
    (1..=3)
        .filter_map(|h| date.and_hms_opt(h, 0, 0))
        .find_map(|n| tz.from_local_datetime(&n).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;

    #[test]
    fn test_utc_tag_detection() {
        assert!(is_utc_tagged(&json!("2024-01-01T10:00:00Z")));
        assert!(is_utc_tagged(&json!("2024-01-01t10:00:00z")));
        assert!(is_utc_tagged(&json!("Mon, 01 Jan 2024 10:00:00 GMT")));
        assert!(is_utc_tagged(&json!("2024-01-01T10:00:00+00:00")));
        assert!(is_utc_tagged(&json!("2024-01-01 10:00:00 utc")));
        assert!(!is_utc_tagged(&json!("2024-01-01 10:00:00")));
        assert!(!is_utc_tagged(&json!("2024-01-01T10:00:00+08:00")));
        assert!(!is_utc_tagged(&json!(1700000000)));
    }

    #[test]
    fn test_majority_tagged_is_utc() {
        let v = vec![
            json!("2024-01-01T10:00:00Z"),
            json!("2024-01-01 10:00:00"),
        ];
        // Exactly half counts as UTC.
        assert_eq!(DayBoundary::infer(&v), DayBoundary::Utc);

        let v = vec![
            json!("2024-01-01T10:00:00Z"),
            json!("2024-01-01 10:00:00"),
            json!(1700000000),
        ];
        assert_eq!(DayBoundary::infer(&v), DayBoundary::Local);
    }

    #[test]
    fn test_empty_sample_is_local() {
        assert_eq!(DayBoundary::infer(&Vec::<Value>::new()), DayBoundary::Local);
        // Unparseable values are not sampled.
        let v = vec![json!("garbage Z"), json!("soon")];
        assert_eq!(DayBoundary::infer(&v), DayBoundary::Local);
    }

    #[test]
    fn test_sample_is_capped() {
        let mut v: Vec<Value> = (0..SAMPLE_SIZE)
            .map(|_| json!("2024-01-01 10:00:00"))
            .collect();
        // Everything after the sample is ignored, however much of it is tagged.
        v.extend((0..100).map(|_| json!("2024-01-01T10:00:00Z")));
        assert_eq!(DayBoundary::infer(&v), DayBoundary::Local);
    }

    #[test]
    fn test_for_executions_uses_end_time() {
        let records: Vec<Record> = vec![
            Record::from_value(json!({"end_time": "2024-01-01T10:00:00Z", "start_time": "2024-01-01 09:00:00"})),
            Record::from_value(json!({"status": "passed"})),
        ];
        assert_eq!(DayBoundary::for_executions(&records), DayBoundary::Utc);
    }

    #[test]
    fn test_for_projects_uses_creation_time() {
        // End times are UTC-tagged, creation times are not: each dataset
        // gets its own frame.
        let projects: Vec<Record> = vec![
            Record::from_value(json!({"created_at": "2024-01-01 08:00:00", "end_time": "2024-01-01T10:00:00Z"})),
            Record::from_value(json!({"create_time": "2024-01-01 09:00:00", "end_time": "2024-01-01T11:00:00Z"})),
            Record::from_value(json!({"createdAt": "2024-01-01T09:30:00Z"})),
        ];
        assert_eq!(DayBoundary::for_projects(&projects), DayBoundary::Local);
        assert_eq!(DayBoundary::for_executions(&projects), DayBoundary::Utc);

        let tagged: Vec<Record> = vec![
            Record::from_value(json!({"create_time": "2024-01-01T08:00:00Z", "end_time": "2024-01-01 10:00:00"})),
            Record::from_value(json!({"name": "no timestamps"})),
        ];
        assert_eq!(DayBoundary::for_projects(&tagged), DayBoundary::Utc);
        assert_eq!(DayBoundary::for_executions(&tagged), DayBoundary::Local);
    }

    #[test]
    fn test_trailing_days_in_fixed_offset() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let days = trailing_days_in(&tz, today, 7);
        assert_eq!(days.len(), 7);
        assert_eq!(days[6], (today, day_window_in(&tz, today)));
        assert_eq!(days[0].0, NaiveDate::from_ymd_opt(2023, 12, 26).unwrap());
    }

    #[test]
    fn test_utc_day_window() {
        let reference = Utc.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap();
        let window = DayBoundary::Utc.day_window(reference);
        assert_eq!(window.start_ms, 1_704_067_200_000);
        assert_eq!(window.end_ms, 1_704_067_200_000 + DAY_MS - 1);
        assert!(window.contains(TimestampMs(1_704_103_200_000)));
        assert!(!window.contains(TimestampMs(1_704_067_200_000 + DAY_MS)));
    }

    #[test]
    fn test_fixed_offset_window() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let window = day_window_in(&tz, date);
        // Local midnight at +08:00 is 16:00 UTC the previous day.
        assert_eq!(window.start_ms, 1_704_067_200_000 - 8 * 3_600_000);
        assert_eq!(window.end_ms - window.start_ms, DAY_MS - 1);
    }

    #[test]
    fn test_trailing_days_oldest_first() {
        let reference = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let days = DayBoundary::Utc.trailing_days(reference, 7);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].0, NaiveDate::from_ymd_opt(2024, 2, 25).unwrap());
        assert_eq!(days[6].0, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        for pair in days.windows(2) {
            assert_eq!(pair[0].1.end_ms + 1, pair[1].1.start_ms);
        }
    }
}

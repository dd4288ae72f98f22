//! Most-recent-first activity log over the fetched executions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::normalize::{self, NormalizedStatus, TimestampMs};
use crate::analysis::record::{self, Record};

/// One row of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub label: Option<String>,
    pub executor: Option<String>,
    pub status: NormalizedStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ActivityEntry {
    pub fn from_record(record: &Record) -> Self {
        Self {
            label: record.text(&record::LABEL),
            executor: record.text(&record::EXECUTOR),
            status: normalize::record_status(record),
            started_at: normalize::start_time_ms(record).and_then(TimestampMs::to_datetime),
            ended_at: normalize::end_time_ms(record).and_then(TimestampMs::to_datetime),
        }
    }
}

/// The `limit` most recently finished executions; unresolved end times sort last.
pub fn recent_activity(records: &[Record], limit: usize) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = records.iter().map(ActivityEntry::from_record).collect();
    entries.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
    entries.truncate(limit);
    entries
}

/// 1-based page of `items`. Pages past the end are empty.
pub fn window<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    if per_page == 0 {
        return &[];
    }
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::normalize::{self, NormalizedStatus, TimestampMs};
use crate::analysis::record::Record;
use crate::analysis::timezone::{DayBoundary, DayWindow};

/// Days covered by the trend series.
pub const TREND_DAYS: u32 = 7;

/// Bucket for projects that declare no package name.
pub const UNSPECIFIED_BUCKET: &str = "unspecified";

/// Success/failure percentages for today and for all history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRates {
    pub today_success_rate: u32,
    pub today_failure_rate: u32,
    pub success_rate: u32,
    pub failure_rate: u32,
}

/// One day of the trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `MM-DD` in the dataset's frame.
    pub label: String,
    pub success_rate: u32,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionBucket {
    pub name: String,
    pub count: usize,
}

/// Pass count over a set of runs.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    passed: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, status: NormalizedStatus) {
        self.total += 1;
        if status == NormalizedStatus::Passed {
            self.passed += 1;
        }
    }

    fn success_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (100.0 * self.passed as f64 / self.total as f64).round() as u32
    }

    fn failure_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        100 - self.success_rate()
    }
}

/// Derives dashboard statistics from normalized record snapshots.
///
/// Inputs are never mutated; every call recomputes from scratch.
pub struct Aggregator;

impl Aggregator {
    /// Rates over the reference day and over every record.
    ///
    /// Records without a resolvable end time still count toward the
    /// historical rates.
    pub fn success_rates(records: &[Record], reference: DateTime<Utc>) -> SuccessRates {
        let today = DayBoundary::for_executions(records).day_window(reference);
        Self::rates_within(records, today)
    }

    fn rates_within(records: &[Record], today: DayWindow) -> SuccessRates {
        let mut all = Tally::default();
        let mut today_tally = Tally::default();
        for record in records {
            let status = normalize::record_status(record);
            all.add(status);
            if normalize::end_time_ms(record).is_some_and(|ts| today.contains(ts)) {
                today_tally.add(status);
            }
        }

        SuccessRates {
            today_success_rate: today_tally.success_rate(),
            today_failure_rate: today_tally.failure_rate(),
            success_rate: all.success_rate(),
            failure_rate: all.failure_rate(),
        }
    }

    /// One point per day for the [`TREND_DAYS`] days ending at the reference
    /// day, oldest first. Always exactly [`TREND_DAYS`] points.
    pub fn trend(records: &[Record], reference: DateTime<Utc>) -> Vec<TrendPoint> {
        let days = DayBoundary::for_executions(records).trailing_days(reference, TREND_DAYS);
        Self::trend_over(records, days)
    }

    fn trend_over(records: &[Record], days: Vec<(NaiveDate, DayWindow)>) -> Vec<TrendPoint> {
        // Resolve once, bucket many times.
        let finished: Vec<(TimestampMs, NormalizedStatus)> = records
            .iter()
            .filter_map(|r| normalize::end_time_ms(r).map(|ts| (ts, normalize::record_status(r))))
            .collect();

        days.into_iter()
            .map(|(date, window)| {
                let mut tally = Tally::default();
                for (ts, status) in &finished {
                    if window.contains(*ts) {
                        tally.add(*status);
                    }
                }
                TrendPoint {
                    label: date.format("%m-%d").to_string(),
                    success_rate: tally.success_rate(),
                    total: tally.total,
                }
            })
            .collect()
    }

    /// Projects created during the reference day, in the projects' own frame.
    pub fn today_new_count(projects: &[Record], reference: DateTime<Utc>) -> usize {
        let today = DayBoundary::for_projects(projects).day_window(reference);
        Self::created_within(projects, today)
    }

    fn created_within(projects: &[Record], today: DayWindow) -> usize {
        projects
            .iter()
            .filter_map(normalize::created_at_ms)
            .filter(|ts| today.contains(*ts))
            .count()
    }

    /// Projects per package name, most common first, `unspecified` last.
    pub fn package_distribution(projects: &[Record]) -> Vec<DistributionBucket> {
        let mut buckets: Vec<DistributionBucket> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut unspecified = 0usize;

        for project in projects {
            let names = normalize::project_package_names(project);
            if names.is_empty() {
                unspecified += 1;
                continue;
            }
            for name in names {
                match index.get(&name) {
                    Some(&i) => buckets[i].count += 1,
                    None => {
                        index.insert(name.clone(), buckets.len());
                        buckets.push(DistributionBucket { name, count: 1 });
                    }
                }
            }
        }

        // Stable: ties keep first-seen order.
        buckets.sort_by(|a, b| b.count.cmp(&a.count));
        if unspecified > 0 {
            buckets.push(DistributionBucket {
                name: UNSPECIFIED_BUCKET.to_string(),
                count: unspecified,
            });
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::timezone::{day_window_in, trailing_days_in};
    use chrono::{FixedOffset, Local, TimeZone};
    use serde_json::{json, Value};

    fn records(raw: Vec<Value>) -> Vec<Record> {
        raw.into_iter().map(Record::from_value).collect()
    }

    fn new_year_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_same_day_pass_and_fail() {
        let execs = records(vec![
            json!({"status": "passed", "end_time": "2024-01-01T10:00:00Z"}),
            json!({"status": "failed", "end_time": "2024-01-01T11:00:00Z"}),
        ]);
        let rates = Aggregator::success_rates(&execs, new_year_noon());

        assert_eq!(rates.success_rate, 50);
        assert_eq!(rates.failure_rate, 50);
        assert_eq!(rates.today_success_rate, 50);
        assert_eq!(rates.today_failure_rate, 50);
    }

    #[test]
    fn test_rates_sum_to_hundred() {
        let execs = records(vec![
            json!({"status": "PASS", "end_time": "2024-01-01T01:00:00Z"}),
            json!({"status": "pass", "end_time": "2024-01-01T02:00:00Z"}),
            json!({"status": "fail", "end_time": "2023-12-30T02:00:00Z"}),
            json!({"status": "skipped"}),
            json!({"status": "通过", "end_time": "2023-12-29T02:00:00Z"}),
            json!({"status": "失败", "end_time": "2023-12-28T02:00:00Z"}),
        ]);
        let rates = Aggregator::success_rates(&execs, new_year_noon());

        // 3 of 6 passed overall, 2 of 2 today.
        assert_eq!(rates.success_rate, 50);
        assert_eq!(rates.success_rate + rates.failure_rate, 100);
        assert_eq!(rates.today_success_rate, 100);
        assert_eq!(rates.today_failure_rate, 0);
    }

    #[test]
    fn test_rates_round_half_up() {
        let execs = records(vec![
            json!({"status": "passed"}),
            json!({"status": "passed"}),
            json!({"status": "failed"}),
        ]);
        let rates = Aggregator::success_rates(&execs, new_year_noon());
        assert_eq!(rates.success_rate, 67);
        assert_eq!(rates.failure_rate, 33);
    }

    #[test]
    fn test_empty_rates_are_zero() {
        let rates = Aggregator::success_rates(&[], new_year_noon());
        assert_eq!(rates, SuccessRates::default());

        // Records exist, but none today.
        let execs = records(vec![json!({"status": "passed", "end_time": "2023-06-01T10:00:00Z"})]);
        let rates = Aggregator::success_rates(&execs, new_year_noon());
        assert_eq!(rates.today_success_rate, 0);
        assert_eq!(rates.today_failure_rate, 0);
        assert_eq!(rates.success_rate, 100);
    }

    #[test]
    fn test_trend_always_seven_points() {
        let reference = new_year_noon();
        assert_eq!(Aggregator::trend(&[], reference).len(), 7);

        let one = records(vec![json!({"status": "passed", "end_time": "2024-01-01T10:00:00Z"})]);
        assert_eq!(Aggregator::trend(&one, reference).len(), 7);

        let many = records(
            (0..500)
                .map(|i| json!({"status": "passed", "end_time": 1_704_000_000 + i * 600}))
                .collect(),
        );
        assert_eq!(Aggregator::trend(&many, reference).len(), 7);
    }

    #[test]
    fn test_trend_buckets_by_day() {
        let execs = records(vec![
            json!({"status": "passed", "end_time": "2024-01-01T10:00:00Z"}),
            json!({"status": "failed", "end_time": "2024-01-01T11:00:00Z"}),
            json!({"status": "passed", "end_time": "2023-12-26T23:59:59Z"}),
            json!({"status": "passed", "end_time": "2023-12-25T12:00:00Z"}),
            json!({"status": "passed"}),
        ]);
        let trend = Aggregator::trend(&execs, new_year_noon());

        let labels: Vec<&str> = trend.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["12-26", "12-27", "12-28", "12-29", "12-30", "12-31", "01-01"]
        );
        assert_eq!(trend[0], TrendPoint { label: "12-26".into(), success_rate: 100, total: 1 });
        assert_eq!(trend[1].total, 0);
        assert_eq!(trend[1].success_rate, 0);
        assert_eq!(trend[6], TrendPoint { label: "01-01".into(), success_rate: 50, total: 2 });
    }

    #[test]
    fn test_today_new_count() {
        let projects = records(vec![
            json!({"created_at": "2024-01-01T00:00:00Z"}),
            json!({"created_at": "2024-01-01T23:59:59.999Z"}),
            json!({"created_at": "2023-12-31T23:59:59Z"}),
            json!({"name": "no timestamp"}),
        ]);
        assert_eq!(Aggregator::today_new_count(&projects, new_year_noon()), 2);
        assert_eq!(Aggregator::today_new_count(&[], new_year_noon()), 0);
    }

    #[test]
    fn test_package_distribution_with_unspecified() {
        let projects = records(vec![
            json!({"product_package_names": "a,b"}),
            json!({"product_package_names": []}),
        ]);
        let dist = Aggregator::package_distribution(&projects);

        assert_eq!(dist.len(), 3);
        assert_eq!(dist[2], DistributionBucket { name: "unspecified".into(), count: 1 });
        let mut named: Vec<&str> = dist[..2].iter().map(|b| b.name.as_str()).collect();
        named.sort();
        assert_eq!(named, vec!["a", "b"]);
        assert!(dist[..2].iter().all(|b| b.count == 1));
    }

    #[test]
    fn test_unspecified_last_even_when_largest() {
        let projects = records(vec![
            json!({"packageNames": ["com.shop", "com.pay"]}),
            json!({"packageNames": "com.shop"}),
            json!({}),
            json!({"product_package_names": ""}),
            json!({"product_package_names": "  "}),
        ]);
        let dist = Aggregator::package_distribution(&projects);

        assert_eq!(
            dist,
            vec![
                DistributionBucket { name: "com.shop".into(), count: 2 },
                DistributionBucket { name: "com.pay".into(), count: 1 },
                DistributionBucket { name: "unspecified".into(), count: 3 },
            ]
        );
    }

    #[test]
    fn test_no_unspecified_bucket_when_all_named() {
        let projects = records(vec![json!({"package_names": "x"})]);
        let dist = Aggregator::package_distribution(&projects);
        assert_eq!(dist, vec![DistributionBucket { name: "x".into(), count: 1 }]);
    }

    fn plus_eight() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_offset_dataset_uses_local_day() {
        // 2024-01-01 00:30 at +08:00 is still Dec 31 in UTC.
        let execs = records(vec![
            json!({"status": "passed", "end_time": "2024-01-01T00:30:00+08:00"}),
            json!({"status": "failed", "end_time": "2024-01-01T23:30:00+08:00"}),
            json!({"status": "passed", "end_time": "2023-12-31T23:30:00+08:00"}),
        ]);
        assert_eq!(DayBoundary::for_executions(&execs), DayBoundary::Local);

        let new_year = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rates = Aggregator::rates_within(&execs, day_window_in(&plus_eight(), new_year));
        assert_eq!(rates.today_success_rate, 50);
        assert_eq!(rates.today_failure_rate, 50);
        assert_eq!(rates.success_rate, 67);

        // The same runs bucketed by UTC day would put two on Dec 31.
        let utc = Aggregator::rates_within(&execs, DayBoundary::Utc.window_for(new_year));
        assert_eq!(utc.today_success_rate, 0);
        assert_eq!(utc.today_failure_rate, 100);
    }

    #[test]
    fn test_trend_in_fixed_offset() {
        let execs = records(vec![
            json!({"status": "passed", "end_time": "2024-01-01T00:30:00+08:00"}),
            json!({"status": "failed", "end_time": "2023-12-31T23:30:00+08:00"}),
        ]);
        let new_year = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let trend = Aggregator::trend_over(&execs, trailing_days_in(&plus_eight(), new_year, TREND_DAYS));

        assert_eq!(trend.len(), 7);
        assert_eq!(trend[5], TrendPoint { label: "12-31".into(), success_rate: 0, total: 1 });
        assert_eq!(trend[6], TrendPoint { label: "01-01".into(), success_rate: 100, total: 1 });
    }

    #[test]
    fn test_offsetless_strings_follow_host_local_day() {
        // Offset-less strings parse in local time, so they land in the local
        // window for any host zone.
        let reference = Local
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let execs = records(vec![
            json!({"status": "passed", "end_time": "2024-06-15 09:00:00"}),
            json!({"status": "passed", "end_time": "2024-06-15 23:59:59"}),
            json!({"status": "failed", "end_time": "2024-06-14 23:30:00"}),
        ]);
        assert_eq!(DayBoundary::for_executions(&execs), DayBoundary::Local);

        let rates = Aggregator::success_rates(&execs, reference);
        assert_eq!(rates.today_success_rate, 100);
        assert_eq!(rates.success_rate, 67);

        let trend = Aggregator::trend(&execs, reference);
        assert_eq!(trend[5], TrendPoint { label: "06-14".into(), success_rate: 0, total: 1 });
        assert_eq!(trend[6], TrendPoint { label: "06-15".into(), success_rate: 100, total: 2 });
    }

    #[test]
    fn test_today_new_uses_project_frame_not_execution_frame() {
        // Creation times carry a non-UTC offset: the projects' own frame is local.
        let projects = records(vec![
            json!({"created_at": "2024-01-01T00:30:00+08:00", "end_time": "2023-01-01T00:00:00Z"}),
            json!({"create_time": "2024-01-01T23:00:00+08:00", "end_time": "2023-01-01T00:00:00Z"}),
            json!({"created_at": "2023-12-31T22:00:00+08:00"}),
        ]);
        assert_eq!(DayBoundary::for_projects(&projects), DayBoundary::Local);

        let new_year = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(Aggregator::created_within(&projects, day_window_in(&plus_eight(), new_year)), 2);
        // UTC day 2024-01-01 holds only the 23:00+08:00 project (15:00Z).
        assert_eq!(Aggregator::created_within(&projects, DayBoundary::Utc.window_for(new_year)), 1);
    }
}

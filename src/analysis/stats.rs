use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::activity::{self, ActivityEntry};
use crate::analysis::aggregator::{Aggregator, DistributionBucket, TrendPoint};
use crate::analysis::record::{self, Record};
use crate::client::{ApiClient, Collected, Endpoint, PageSource, Paginator};
use crate::config::Config;

/// Top-line dashboard numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub project_count: u64,
    pub automation_project_count: u64,
    pub execution_count: u64,
    pub today_success_rate: u32,
    pub today_failure_rate: u32,
    pub success_rate: u32,
    pub failure_rate: u32,
    pub today_new_projects: usize,
}

/// Composite statistics handed to presentation code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub overview: Overview,
    pub trend: Vec<TrendPoint>,
    pub package_distribution: Vec<DistributionBucket>,
    pub generated_at: DateTime<Utc>,
}

/// Result of one refresh cycle: the stats plus the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub stats: DashboardStats,
    pub activity: Vec<ActivityEntry>,
}

/// Everything one refresh fetched. Built per cycle and dropped afterwards.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    pub reference: DateTime<Utc>,
    pub projects: Vec<Record>,
    pub project_total: Option<u64>,
    pub automation_project_count: u64,
    pub executions: Vec<Record>,
    /// Server total from the probe or the full pagination, if either reported one.
    pub execution_total: Option<u64>,
}

impl AggregationContext {
    /// Context with no fetched data, as left behind by total upstream failure.
    pub fn empty(reference: DateTime<Utc>) -> Self {
        Self {
            reference,
            projects: Vec::new(),
            project_total: None,
            automation_project_count: 0,
            executions: Vec::new(),
            execution_total: None,
        }
    }

    pub fn compute(&self) -> DashboardStats {
        let rates = Aggregator::success_rates(&self.executions, self.reference);

        let overview = Overview {
            project_count: self.project_total.unwrap_or(self.projects.len() as u64),
            automation_project_count: self.automation_project_count,
            execution_count: self.execution_total.unwrap_or(self.executions.len() as u64),
            today_success_rate: rates.today_success_rate,
            today_failure_rate: rates.today_failure_rate,
            success_rate: rates.success_rate,
            failure_rate: rates.failure_rate,
            today_new_projects: Aggregator::today_new_count(&self.projects, self.reference),
        };

        DashboardStats {
            overview,
            trend: Aggregator::trend(&self.executions, self.reference),
            package_distribution: Aggregator::package_distribution(&self.projects),
            generated_at: self.reference,
        }
    }

    pub fn activity(&self, limit: usize) -> Vec<ActivityEntry> {
        activity::recent_activity(&self.executions, limit)
    }
}

/// Fetches from the backend and derives dashboard statistics.
#[derive(Clone)]
pub struct StatsService {
    paginator: Paginator,
    projects: Endpoint,
    automation_projects: Endpoint,
    executions: Endpoint,
    activity_limit: usize,
}

impl StatsService {
    pub fn new(source: Arc<dyn PageSource>, config: &Config) -> Self {
        Self {
            paginator: Paginator::new(source, &config.pagination),
            projects: config.projects_endpoint(),
            automation_projects: config.automation_projects_endpoint(),
            executions: config.executions_endpoint(),
            activity_limit: config.refresh.activity_limit,
        }
    }

    /// Service talking HTTP to the configured upstream.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.upstream)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Fetch everything concurrently. Sub-fetch failures degrade to empty.
    pub async fn gather(&self, reference: DateTime<Utc>) -> AggregationContext {
        let (projects, automation_projects, execution_probe, executions) = tokio::join!(
            self.paginator.fetch_all(&self.projects),
            self.paginator.fetch_all(&self.automation_projects),
            self.paginator.probe_total(&self.executions),
            self.paginator.fetch_all(&self.executions),
        );

        for (name, collected) in [
            ("projects", &projects),
            ("automation_projects", &automation_projects),
            ("executions", &executions),
        ] {
            if collected.degraded {
                warn!(resource = name, items = collected.items.len(), "sub-fetch degraded");
            }
        }

        let Collected {
            items: project_items,
            total_count: project_total,
            ..
        } = projects;
        let execution_total = execution_probe.or(executions.total_count);

        AggregationContext {
            reference,
            projects: record::records(project_items),
            project_total,
            automation_project_count: automation_projects.count(),
            executions: record::records(executions.items),
            execution_total,
        }
    }

    /// The `limit` most recent executions, fetched on demand.
    ///
    /// Unlike [`Snapshot::activity`] this is not capped by the configured
    /// activity limit.
    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        let executions = self.paginator.fetch_all(&self.executions).await;
        activity::recent_activity(&record::records(executions.items), limit)
    }

    /// One full fetch-and-aggregate cycle.
    pub async fn refresh(&self, reference: DateTime<Utc>) -> Snapshot {
        let ctx = self.gather(reference).await;
        let stats = ctx.compute();
        info!(
            projects = stats.overview.project_count,
            executions = stats.overview.execution_count,
            success_rate = stats.overview.success_rate,
            "refresh complete"
        );
        Snapshot {
            activity: ctx.activity(self.activity_limit),
            stats,
        }
    }
}

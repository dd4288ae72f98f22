//! Latest-snapshot store and the periodic background refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::analysis::stats::{Snapshot, StatsService};

/// Holds the most recently completed snapshot.
///
/// Refreshes publish in completion order, so with overlapping refreshes the
/// last one to finish wins.
#[derive(Clone, Default)]
pub struct StatsStore {
    latest: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }

    pub async fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.latest.write().await = Some(snapshot.clone());
        snapshot
    }
}

/// Run one cycle against the current time and publish it.
pub async fn refresh_once(service: &StatsService, store: &StatsStore) -> Arc<Snapshot> {
    let snapshot = service.refresh(Utc::now()).await;
    store.publish(snapshot).await
}

/// Background loop: refresh immediately, then every `every`.
///
/// Runs alongside user-triggered refreshes without coordinating with them.
pub async fn run_refresh_loop(service: Arc<StatsService>, store: StatsStore, every: Duration) {
    info!(interval_secs = every.as_secs(), "Background refresh started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let snapshot = refresh_once(&service, &store).await;
        debug!(generated_at = %snapshot.stats.generated_at, "background refresh published");
    }
}

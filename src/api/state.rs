use std::sync::Arc;

use crate::analysis::stats::StatsService;
use crate::refresh::StatsStore;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StatsService>,
    pub store: StatsStore,
}

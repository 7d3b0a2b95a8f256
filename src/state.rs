use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::history::HistoryLog;
use crate::ingest::ReadingIngestor;
use crate::stats::IngestStats;
use crate::store::StateStore;
use crate::weather::{DegradePath, WeatherProvider};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: ReadingIngestor,
    pub dashboard: Arc<Dashboard>,
    pub stats: Arc<IngestStats>,
}

impl AppState {
    /// Wires the write and read paths around one pair of store handles.
    pub fn new(
        config: &Config,
        state: Arc<dyn StateStore>,
        history: Arc<dyn HistoryLog>,
        provider: Arc<dyn WeatherProvider>,
    ) -> Self {
        let stats = Arc::new(IngestStats::new());
        let ingestor = ReadingIngestor::new(state.clone(), history.clone(), stats.clone());
        let degrade = DegradePath::new(
            provider,
            ingestor.clone(),
            state.clone(),
            config.fetch_timeout(),
        );
        let dashboard = Dashboard::new(
            state,
            history,
            degrade,
            config.machines.clone(),
            config.sites.clone(),
        )
        .with_history_limits(config.machine_history_limit, config.site_history_limit);

        Self {
            ingestor,
            dashboard: Arc::new(dashboard),
            stats,
        }
    }
}

impl FromRef<AppState> for ReadingIngestor {
    fn from_ref(state: &AppState) -> ReadingIngestor {
        state.ingestor.clone()
    }
}

impl FromRef<AppState> for Arc<Dashboard> {
    fn from_ref(state: &AppState) -> Arc<Dashboard> {
        state.dashboard.clone()
    }
}

impl FromRef<AppState> for Arc<IngestStats> {
    fn from_ref(state: &AppState) -> Arc<IngestStats> {
        state.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryLog;
    use crate::ingest::IngestRequest;
    use crate::store::MemoryStateStore;
    use crate::test_support::{test_config, UnreachableProvider};

    #[tokio::test]
    async fn configured_machines_and_limits_reach_the_dashboard() {
        let mut config = test_config();
        config.machines = vec!["Press-7".to_string()];
        config.machine_history_limit = 2;
        let state = AppState::new(
            &config,
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryHistoryLog::new()),
            Arc::new(UnreachableProvider),
        );

        for value in [10.0, 20.0, 30.0] {
            state
                .ingestor
                .ingest(IngestRequest::machine("Press-7", "temp", value, None))
                .await
                .unwrap();
        }

        let overview = state.dashboard.machines_overview().await;
        assert_eq!(overview.machines.len(), 1);
        assert_eq!(overview.machines[0].id, "Press-7");
        assert_eq!(overview.recent.len(), 2);
        assert_eq!(state.stats.snapshot().accepted, 3);
    }
}

use crate::alerts::AlertCounter;
use crate::classify::Status;
use crate::history::{HistoryEntry, HistoryFilter, HistoryLog};
use crate::store::{LatestState, StateStore};
use crate::weather::{DegradePath, SiteConfig, SiteView};
use futures::future;
use serde::Serialize;
use std::sync::Arc;

pub const MACHINE_HISTORY_LIMIT: usize = 10;
pub const SITE_HISTORY_LIMIT: usize = 15;
pub const NEVER_SEEN: &str = "never";
pub const UNKNOWN_METRIC: &str = "N/A";
const LAST_SEEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Normal,
    Warning,
    Critical,
    Offline,
}

impl From<Status> for MachineStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Normal => MachineStatus::Normal,
            Status::Warning => MachineStatus::Warning,
            Status::Critical => MachineStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineView {
    pub id: String,
    pub value: f64,
    pub status: MachineStatus,
    pub last_seen: String,
    pub metric: String,
}

impl MachineView {
    pub fn offline(id: &str) -> Self {
        Self {
            id: id.to_string(),
            value: 0.0,
            status: MachineStatus::Offline,
            last_seen: NEVER_SEEN.to_string(),
            metric: UNKNOWN_METRIC.to_string(),
        }
    }

    fn from_state(id: &str, state: LatestState) -> Self {
        Self {
            id: id.to_string(),
            value: state.value,
            status: state.status.into(),
            last_seen: state.last_seen.format(LAST_SEEN_FORMAT).to_string(),
            metric: state.metric,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MachinesOverview {
    pub machines: Vec<MachineView>,
    pub recent: Vec<HistoryEntry>,
    pub alert_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SitesOverview {
    pub sites: Vec<SiteView>,
    pub recent: Vec<HistoryEntry>,
}

/// Read side: assembles machine and site overviews, falling back to placeholders whenever a
/// store read fails.
#[derive(Clone)]
pub struct Dashboard {
    state: Arc<dyn StateStore>,
    history: Arc<dyn HistoryLog>,
    alerts: AlertCounter,
    degrade: DegradePath,
    machines: Vec<String>,
    sites: Vec<SiteConfig>,
    machine_history_limit: usize,
    site_history_limit: usize,
}

impl Dashboard {
    pub fn new(
        state: Arc<dyn StateStore>,
        history: Arc<dyn HistoryLog>,
        degrade: DegradePath,
        machines: Vec<String>,
        sites: Vec<SiteConfig>,
    ) -> Self {
        Self {
            alerts: AlertCounter::new(state.clone()),
            state,
            history,
            degrade,
            machines,
            sites,
            machine_history_limit: MACHINE_HISTORY_LIMIT,
            site_history_limit: SITE_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limits(mut self, machines: usize, sites: usize) -> Self {
        self.machine_history_limit = machines;
        self.site_history_limit = sites;
        self
    }

    pub async fn machine(&self, id: &str) -> MachineView {
        match self.state.get(id).await {
            Ok(Some(state)) => MachineView::from_state(id, state),
            Ok(None) => MachineView::offline(id),
            Err(err) => {
                tracing::warn!(machine = %id, error = %err, "latest state read failed");
                MachineView::offline(id)
            }
        }
    }

    pub async fn machines_overview(&self) -> MachinesOverview {
        let machines =
            future::join_all(self.machines.iter().map(|id| self.machine(id))).await;
        let recent = self
            .recent(HistoryFilter::Machines, self.machine_history_limit)
            .await;
        let alert_count = match self.alerts.total().await {
            Ok(total) => total,
            Err(err) => {
                tracing::warn!(error = %err, "alert total read failed");
                0
            }
        };
        MachinesOverview {
            machines,
            recent,
            alert_count,
        }
    }

    pub async fn sites_overview(&self) -> SitesOverview {
        let sites = future::join_all(self.sites.iter().map(|site| self.degrade.view(site))).await;
        let recent = self
            .recent(HistoryFilter::Sites, self.site_history_limit)
            .await;
        SitesOverview { sites, recent }
    }

    async fn recent(&self, filter: HistoryFilter, limit: usize) -> Vec<HistoryEntry> {
        match self.history.query(filter, limit).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(?filter, error = %err, "history query failed");
                Vec::new()
            }
        }
    }
}

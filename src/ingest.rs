mod ingestor;
mod types;

#[cfg(test)]
mod tests;

pub use types::{IngestRequest, RawValue, Reading, SiteDetails};

use crate::alerts::AlertCounter;
use crate::history::HistoryLog;
use crate::stats::IngestStats;
use crate::store::StateStore;
use std::sync::Arc;

/// Classifies readings and fans them out to the state store, alert counter and history log.
///
/// The three writes are independent: a failing store is logged and counted, the others still
/// run, and nothing is rolled back.
#[derive(Clone)]
pub struct ReadingIngestor {
    state: Arc<dyn StateStore>,
    history: Arc<dyn HistoryLog>,
    alerts: AlertCounter,
    stats: Arc<IngestStats>,
}

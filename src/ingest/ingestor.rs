use super::{IngestRequest, Reading, ReadingIngestor};
use crate::alerts::AlertCounter;
use crate::error::ValidationError;
use crate::history::HistoryLog;
use crate::stats::IngestStats;
use crate::store::StateStore;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl ReadingIngestor {
    pub fn new(
        state: Arc<dyn StateStore>,
        history: Arc<dyn HistoryLog>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            alerts: AlertCounter::new(state.clone()),
            state,
            history,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    pub fn alerts(&self) -> &AlertCounter {
        &self.alerts
    }

    /// Validates, classifies and writes one reading.
    ///
    /// Only validation can fail. Once it passes the reading is returned even if some or all of
    /// the downstream writes failed.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Reading, ValidationError> {
        let reading = match request.into_reading() {
            Ok(reading) => reading,
            Err(err) => {
                IngestStats::bump(&self.stats.rejected);
                return Err(err);
            }
        };

        self.write_state(&reading).await;
        self.record_alert(&reading).await;
        self.append_history(&reading).await;

        IngestStats::bump(&self.stats.accepted);
        self.stats
            .last_ingest_unix_ms
            .store(Utc::now().timestamp_millis().max(0) as u64, Ordering::Relaxed);
        tracing::debug!(
            source = %reading.source_id,
            metric = %reading.metric_name,
            value = reading.value,
            status = %reading.status,
            "ingested reading"
        );
        Ok(reading)
    }

    async fn write_state(&self, reading: &Reading) {
        match self
            .state
            .put(&reading.source_id, reading.latest_state())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                IngestStats::bump(&self.stats.stale_state_writes);
                tracing::debug!(
                    source = %reading.source_id,
                    observed_at = %reading.observed_at,
                    "kept newer stored snapshot"
                );
            }
            Err(err) => {
                IngestStats::bump(&self.stats.state_write_failures);
                self.stats.record_error(err.to_string());
                tracing::warn!(source = %reading.source_id, error = %err, "latest state write failed");
            }
        }
    }

    async fn record_alert(&self, reading: &Reading) {
        match self.alerts.record_if_critical(reading.status).await {
            Ok(Some(total)) => {
                tracing::info!(source = %reading.source_id, value = reading.value, total, "critical reading");
            }
            Ok(None) => {}
            Err(err) => {
                IngestStats::bump(&self.stats.alert_failures);
                self.stats.record_error(err.to_string());
                tracing::warn!(source = %reading.source_id, error = %err, "alert counter update failed");
            }
        }
    }

    async fn append_history(&self, reading: &Reading) {
        if let Err(err) = self.history.append(reading.history_entry()).await {
            IngestStats::bump(&self.stats.history_failures);
            self.stats.record_error(err.to_string());
            tracing::warn!(source = %reading.source_id, error = %err, "history append failed");
        }
    }
}

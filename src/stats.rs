use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

#[derive(Debug, Default)]
pub struct IngestStats {
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub stale_state_writes: AtomicU64,
    pub state_write_failures: AtomicU64,
    pub alert_failures: AtomicU64,
    pub history_failures: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub last_ingest_unix_ms: AtomicU64,
    pub last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub stale_state_writes: u64,
    pub state_write_failures: u64,
    pub alert_failures: u64,
    pub history_failures: u64,
    pub fetch_failures: u64,
    pub last_ingest_unix_ms: u64,
    pub last_error: Option<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            stale_state_writes: self.stale_state_writes.load(Ordering::Relaxed),
            state_write_failures: self.state_write_failures.load(Ordering::Relaxed),
            alert_failures: self.alert_failures.load(Ordering::Relaxed),
            history_failures: self.history_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            last_ingest_unix_ms: self.last_ingest_unix_ms.load(Ordering::Relaxed),
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
        }
    }
}

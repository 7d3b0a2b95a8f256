mod memory;
mod postgres;

pub use memory::MemoryStateStore;
pub use postgres::PgStateStore;

use crate::classify::Status;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATE_KEY_PREFIX: &str = "state:";

/// Latest known snapshot of one source. Always written whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestState {
    pub value: f64,
    pub status: Status,
    pub last_seen: DateTime<Utc>,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_city: Option<String>,
}

pub fn state_key(source_id: &str) -> String {
    format!("{STATE_KEY_PREFIX}{source_id}")
}

/// Fast mutable store for per-source snapshots and named counters.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Replaces the snapshot for `source_id` when `state.last_seen` is strictly newer than the
    /// stored one. Returns `false` when the stored snapshot was kept.
    async fn put(&self, source_id: &str, state: LatestState) -> Result<bool, StoreError>;

    async fn get(&self, source_id: &str) -> Result<Option<LatestState>, StoreError>;

    /// Atomically adds one to `counter_key` and returns the new total.
    async fn increment(&self, counter_key: &str) -> Result<u64, StoreError>;

    async fn counter(&self, counter_key: &str) -> Result<Option<u64>, StoreError>;
}

mod memory;
mod postgres;

pub use memory::MemoryHistoryLog;
pub use postgres::PgHistoryLog;

use crate::classify::Status;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Which of the two entry categories a record belongs to. Exactly one identifying field is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistorySubject {
    Machine { source_id: String },
    Site { site: String, display_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub subject: HistorySubject,
    pub metric: String,
    pub value: f64,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    Machines,
    Sites,
}

impl HistoryFilter {
    pub fn matches(self, entry: &HistoryEntry) -> bool {
        matches!(
            (self, &entry.subject),
            (HistoryFilter::Machines, HistorySubject::Machine { .. })
                | (HistoryFilter::Sites, HistorySubject::Site { .. })
        )
    }
}

/// Durable append-only log of readings. No update or delete.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), StoreError>;

    /// Most recent first, at most `limit` entries of the given category.
    async fn query(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError>;
}

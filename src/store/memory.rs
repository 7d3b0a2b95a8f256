use super::{state_key, LatestState, StateStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, LatestState>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, source_id: &str, state: LatestState) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let key = state_key(source_id);
        let newer = entries
            .get(&key)
            .map(|prev| state.last_seen > prev.last_seen)
            .unwrap_or(true);
        if newer {
            entries.insert(key, state);
        }
        Ok(newer)
    }

    async fn get(&self, source_id: &str) -> Result<Option<LatestState>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&state_key(source_id)).cloned())
    }

    async fn increment(&self, counter_key: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let total = counters.entry(counter_key.to_string()).or_insert(0);
        *total += 1;
        Ok(*total)
    }

    async fn counter(&self, counter_key: &str) -> Result<Option<u64>, StoreError> {
        let counters = self.counters.lock().await;
        Ok(counters.get(counter_key).copied())
    }
}

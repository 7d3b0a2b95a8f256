use crate::classify::Status;
use crate::error::StoreError;
use crate::store::StateStore;
use std::sync::Arc;

pub const GLOBAL_ALERTS_KEY: &str = "global_alerts_count";

/// Running total of CRITICAL readings. Never decremented.
#[derive(Clone)]
pub struct AlertCounter {
    store: Arc<dyn StateStore>,
}

impl AlertCounter {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Call at most once per reading. Returns the new total when an increment happened.
    pub async fn record_if_critical(&self, status: Status) -> Result<Option<u64>, StoreError> {
        if status != Status::Critical {
            return Ok(None);
        }
        let total = self.store.increment(GLOBAL_ALERTS_KEY).await?;
        Ok(Some(total))
    }

    pub async fn total(&self) -> Result<u64, StoreError> {
        Ok(self.store.counter(GLOBAL_ALERTS_KEY).await?.unwrap_or(0))
    }
}

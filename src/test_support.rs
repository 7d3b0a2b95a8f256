use crate::config::{default_sites, Config};
use crate::error::{FetchError, StoreError};
use crate::history::{HistoryEntry, HistoryFilter, HistoryLog, MemoryHistoryLog};
use crate::state::AppState;
use crate::store::{LatestState, MemoryStateStore, StateStore};
use crate::weather::{CurrentConditions, SiteConfig, WeatherProvider};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory state store whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyStateStore {
    pub inner: MemoryStateStore,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_increment: AtomicBool,
}

impl FlakyStateStore {
    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("state store", format!("{op} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn put(&self, source_id: &str, state: LatestState) -> Result<bool, StoreError> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put(source_id, state).await
    }

    async fn get(&self, source_id: &str) -> Result<Option<LatestState>, StoreError> {
        Self::check(&self.fail_get, "get")?;
        self.inner.get(source_id).await
    }

    async fn increment(&self, counter_key: &str) -> Result<u64, StoreError> {
        Self::check(&self.fail_increment, "increment")?;
        self.inner.increment(counter_key).await
    }

    async fn counter(&self, counter_key: &str) -> Result<Option<u64>, StoreError> {
        Self::check(&self.fail_get, "counter")?;
        self.inner.counter(counter_key).await
    }
}

#[derive(Default)]
pub struct FlakyHistoryLog {
    pub inner: MemoryHistoryLog,
    pub fail_append: AtomicBool,
    pub fail_query: AtomicBool,
}

#[async_trait]
impl HistoryLog for FlakyHistoryLog {
    async fn append(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("history log", "append refused"));
        }
        self.inner.append(entry).await
    }

    async fn query(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("history log", "query refused"));
        }
        self.inner.query(filter, limit).await
    }
}

/// Pool bound to a fresh schema, or `None` unless `MONITOR_INTEGRATION_TEST=1` and
/// `MONITOR_TEST_DATABASE_URL` are set.
pub async fn pg_test_pool(tag: &str) -> Result<Option<(PgPool, String)>> {
    if env::var("MONITOR_INTEGRATION_TEST").ok().as_deref() != Some("1") {
        return Ok(None);
    }
    let database_url = match env::var("MONITOR_TEST_DATABASE_URL") {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    let schema = format!("monitor_test_{}_{}", tag, std::process::id());
    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(&admin_pool)
        .await?;
    drop(admin_pool);

    let schema_name = schema.clone();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .after_connect(move |conn, _meta| {
            let schema = schema_name.clone();
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {}", schema))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await?;
    crate::db::ensure_tables(&pool).await?;

    Ok(Some((pool, schema)))
}

pub async fn drop_test_schema(schema: &str) {
    let Ok(database_url) = env::var("MONITOR_TEST_DATABASE_URL") else {
        return;
    };
    let Ok(admin_pool) = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    else {
        return;
    };
    let _ = sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .execute(&admin_pool)
        .await;
}

/// Provider that always fails as if the host refused the connection.
pub struct UnreachableProvider;

#[async_trait]
impl WeatherProvider for UnreachableProvider {
    async fn current(&self, _site: &SiteConfig) -> Result<CurrentConditions, FetchError> {
        Err(FetchError::Connect("connection refused".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        db_pool_size: 1,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        machines: ["Machine-A1", "Machine-B2", "Machine-C3"]
            .iter()
            .map(|id| id.to_string())
            .collect(),
        sites: default_sites(),
        weather_base_url: "http://127.0.0.1:9".to_string(),
        fetch_timeout_secs: 1,
        machine_history_limit: 10,
        site_history_limit: 15,
        otlp_endpoint: None,
    }
}

/// In-memory stores with a provider that never answers successfully.
pub fn test_state() -> AppState {
    AppState::new(
        &test_config(),
        Arc::new(MemoryStateStore::new()),
        Arc::new(MemoryHistoryLog::new()),
        Arc::new(UnreachableProvider),
    )
}

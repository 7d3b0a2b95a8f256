use super::{state_key, LatestState, StateStore};
use crate::classify::Status;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

const STORE: &str = "state store";

#[derive(Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn put(&self, source_id: &str, state: LatestState) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO latest_state (key, value, status, last_seen, metric, description, display_city)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                status = EXCLUDED.status,
                last_seen = EXCLUDED.last_seen,
                metric = EXCLUDED.metric,
                description = EXCLUDED.description,
                display_city = EXCLUDED.display_city
            WHERE latest_state.last_seen < EXCLUDED.last_seen
            "#,
        )
        .bind(state_key(source_id))
        .bind(state.value)
        .bind(state.status.as_str())
        .bind(state.last_seen)
        .bind(&state.metric)
        .bind(state.description.as_deref())
        .bind(state.display_city.as_deref())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_db(STORE))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, source_id: &str) -> Result<Option<LatestState>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT value, status, last_seen, metric, description, display_city
            FROM latest_state
            WHERE key = $1
            "#,
        )
        .bind(state_key(source_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_db(STORE))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_status = row
            .try_get::<String, _>("status")
            .map_err(StoreError::from_db(STORE))?;
        let status = Status::parse(&raw_status).ok_or_else(|| {
            StoreError::unavailable(STORE, format!("unknown status {raw_status:?} for {source_id}"))
        })?;

        Ok(Some(LatestState {
            value: row.try_get("value").map_err(StoreError::from_db(STORE))?,
            status,
            last_seen: row
                .try_get::<DateTime<Utc>, _>("last_seen")
                .map_err(StoreError::from_db(STORE))?,
            metric: row.try_get("metric").map_err(StoreError::from_db(STORE))?,
            description: row
                .try_get("description")
                .map_err(StoreError::from_db(STORE))?,
            display_city: row
                .try_get("display_city")
                .map_err(StoreError::from_db(STORE))?,
        }))
    }

    async fn increment(&self, counter_key: &str) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (key, value)
            VALUES ($1, 1)
            ON CONFLICT (key) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(counter_key)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_db(STORE))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn counter(&self, counter_key: &str) -> Result<Option<u64>, StoreError> {
        let total: Option<i64> = sqlx::query_scalar("SELECT value FROM counters WHERE key = $1")
            .bind(counter_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_db(STORE))?;
        Ok(total.map(|value| u64::try_from(value).unwrap_or(0)))
    }
}

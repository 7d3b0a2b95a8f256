use super::{HistoryEntry, HistoryFilter, HistoryLog, HistorySubject};
use crate::classify::Status;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const STORE: &str = "history log";

#[derive(Clone)]
pub struct PgHistoryLog {
    pool: PgPool,
}

impl PgHistoryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryLog for PgHistoryLog {
    async fn append(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let (source_id, site, display_name) = match &entry.subject {
            HistorySubject::Machine { source_id } => (Some(source_id.as_str()), None, None),
            HistorySubject::Site { site, display_name } => {
                (None, Some(site.as_str()), Some(display_name.as_str()))
            }
        };
        sqlx::query(
            r#"
            INSERT INTO history_entries (
                id, source_id, site, display_name, metric, value, status, description, observed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(source_id)
        .bind(site)
        .bind(display_name)
        .bind(&entry.metric)
        .bind(entry.value)
        .bind(entry.status.as_str())
        .bind(entry.description.as_deref())
        .bind(entry.observed_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_db(STORE))?;
        Ok(())
    }

    async fn query(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let sql = match filter {
            HistoryFilter::Machines => {
                r#"
                SELECT id, source_id, site, display_name, metric, value, status, description, observed_at
                FROM history_entries
                WHERE source_id IS NOT NULL
                ORDER BY seq DESC
                LIMIT $1
                "#
            }
            HistoryFilter::Sites => {
                r#"
                SELECT id, source_id, site, display_name, metric, value, status, description, observed_at
                FROM history_entries
                WHERE site IS NOT NULL
                ORDER BY seq DESC
                LIMIT $1
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_db(STORE))?;

        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &PgRow) -> Result<HistoryEntry, StoreError> {
    let source_id: Option<String> = row.try_get("source_id").map_err(StoreError::from_db(STORE))?;
    let site: Option<String> = row.try_get("site").map_err(StoreError::from_db(STORE))?;
    let display_name: Option<String> = row
        .try_get("display_name")
        .map_err(StoreError::from_db(STORE))?;

    let subject = match (source_id, site) {
        (Some(source_id), None) => HistorySubject::Machine { source_id },
        (None, Some(site)) => HistorySubject::Site {
            display_name: display_name.unwrap_or_else(|| site.clone()),
            site,
        },
        _ => {
            return Err(StoreError::unavailable(
                STORE,
                "history row has neither or both of source_id and site",
            ))
        }
    };

    let raw_status: String = row.try_get("status").map_err(StoreError::from_db(STORE))?;
    let status = Status::parse(&raw_status)
        .ok_or_else(|| StoreError::unavailable(STORE, format!("unknown status {raw_status:?}")))?;

    Ok(HistoryEntry {
        id: row
            .try_get::<Uuid, _>("id")
            .map_err(StoreError::from_db(STORE))?,
        subject,
        metric: row.try_get("metric").map_err(StoreError::from_db(STORE))?,
        value: row.try_get("value").map_err(StoreError::from_db(STORE))?,
        status,
        description: row
            .try_get("description")
            .map_err(StoreError::from_db(STORE))?,
        observed_at: row
            .try_get::<DateTime<Utc>, _>("observed_at")
            .map_err(StoreError::from_db(STORE))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{drop_test_schema, pg_test_pool};
    use anyhow::Result;

    #[tokio::test]
    async fn test_pg_history_orders_and_filters() -> Result<()> {
        let Some((pool, schema)) = pg_test_pool("history").await? else {
            return Ok(());
        };
        let log = PgHistoryLog::new(pool.clone());

        for i in 0..3 {
            log.append(HistoryEntry {
                id: Uuid::new_v4(),
                subject: HistorySubject::Machine {
                    source_id: "Machine-B2".to_string(),
                },
                metric: "temperature".to_string(),
                value: 80.0 + i as f64,
                status: Status::Critical,
                description: None,
                observed_at: Utc::now(),
            })
            .await?;
        }
        log.append(HistoryEntry {
            id: Uuid::new_v4(),
            subject: HistorySubject::Site {
                site: "lyon".to_string(),
                display_name: "Lyon".to_string(),
            },
            metric: "temperature".to_string(),
            value: 18.0,
            status: Status::Normal,
            description: Some("overcast".to_string()),
            observed_at: Utc::now(),
        })
        .await?;

        let machines = log.query(HistoryFilter::Machines, 2).await?;
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[0].value, 82.0);
        assert_eq!(machines[1].value, 81.0);

        let sites = log.query(HistoryFilter::Sites, 15).await?;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].description.as_deref(), Some("overcast"));

        drop_test_schema(&schema).await;
        Ok(())
    }
}

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(8))
        .connect_lazy(database_url)
        .with_context(|| format!("Failed to create lazy database pool for {database_url}"))
}

/// Creates the state, counter and history tables when missing.
pub async fn ensure_tables(db: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS latest_state (
            key text primary key,
            value double precision not null,
            status text not null,
            last_seen timestamptz not null,
            metric text not null,
            description text null,
            display_city text null
        )
        "#,
    )
    .execute(db)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counters (
            key text primary key,
            value bigint not null
        )
        "#,
    )
    .execute(db)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_entries (
            seq bigserial primary key,
            id uuid not null,
            source_id text null,
            site text null,
            display_name text null,
            metric text not null,
            value double precision not null,
            status text not null,
            description text null,
            observed_at timestamptz not null,
            CHECK ((source_id IS NULL) <> (site IS NULL))
        )
        "#,
    )
    .execute(db)
    .await?;
    Ok(())
}

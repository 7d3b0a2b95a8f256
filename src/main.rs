use anyhow::{Context, Result};
use factory_monitor::config::Config;
use factory_monitor::history::{HistoryLog, MemoryHistoryLog, PgHistoryLog};
use factory_monitor::state::AppState;
use factory_monitor::store::{MemoryStateStore, PgStateStore, StateStore};
use factory_monitor::weather::OpenMeteoProvider;
use factory_monitor::{db, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

fn init_tracing(config: &Config) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,factory_monitor=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    match config
        .otlp_endpoint
        .as_deref()
        .map(normalize_otlp_http_endpoint)
        .filter(|endpoint| !endpoint.is_empty())
    {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint(endpoint);
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(OTelTraceConfig::default().with_resource(Resource::new(
                    vec![KeyValue::new("service.name", "factory-monitor")],
                )))
                .install_batch(Tokio)?;

            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(otel_layer)
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

fn normalize_otlp_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains("/v1/traces") {
        return trimmed.to_string();
    }
    format!("{}/v1/traces", trimmed.trim_end_matches('/'))
}

async fn build_stores(config: &Config) -> Result<(Arc<dyn StateStore>, Arc<dyn HistoryLog>)> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::info!("no database configured; using in-memory stores");
        return Ok((
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryHistoryLog::new()),
        ));
    };

    let pool = db::connect_lazy(database_url, config.db_pool_size)?;
    // Store calls degrade per request; an unreachable database is not fatal here.
    if let Err(err) = db::ensure_tables(&pool).await {
        tracing::warn!(error = %err, "failed to ensure tables; continuing with degraded stores");
    }
    Ok((
        Arc::new(PgStateStore::new(pool.clone())),
        Arc::new(PgHistoryLog::new(pool)),
    ))
}

const BIND_HINT: &str = "set MONITOR_BIND_ADDR to a free address";

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::AddrInUse => anyhow::anyhow!(
            "factory-monitor cannot listen on {addr}: port already in use; {BIND_HINT}"
        ),
        _ => anyhow::Error::new(err)
            .context(format!("factory-monitor cannot listen on {addr}; {BIND_HINT}")),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let (state_store, history) = build_stores(&config).await?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("factory-monitor/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let provider = Arc::new(OpenMeteoProvider::new(
        http,
        config.weather_base_url.clone(),
        config.fetch_timeout(),
    ));

    let bind_addr = config.bind_addr;
    tracing::info!(
        %bind_addr,
        machines = config.machines.len(),
        sites = config.sites.len(),
        persistent = config.database_url.is_some(),
        "starting factory-monitor"
    );
    let state = AppState::new(&config, state_store, history, provider);
    let app = routes::router(state);

    let listener = bind_listener(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

use crate::dashboard::{MACHINE_HISTORY_LIMIT, SITE_HISTORY_LIMIT};
use crate::weather::SiteConfig;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_MACHINES: &str = "Machine-A1,Machine-B2,Machine-C3";
const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub bind_addr: SocketAddr,
    pub machines: Vec<String>,
    pub sites: Vec<SiteConfig>,
    pub weather_base_url: String,
    pub fetch_timeout_secs: u64,
    pub machine_history_limit: usize,
    pub site_history_limit: usize,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = env::var("MONITOR_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(normalize_database_url);

        let db_pool_size = env::var("MONITOR_DB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let bind_addr = env::var("MONITOR_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("MONITOR_BIND_ADDR must be a socket address like 0.0.0.0:5000")?;
        let machines = parse_machine_list(
            &env::var("MONITOR_MACHINES").unwrap_or_else(|_| DEFAULT_MACHINES.to_string()),
        );
        let sites = match env::var("MONITOR_SITES_PATH") {
            Ok(path) if !path.trim().is_empty() => load_sites(Path::new(path.trim())),
            _ => default_sites(),
        };
        let weather_base_url = env::var("MONITOR_WEATHER_BASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.to_string());
        let fetch_timeout_secs = env::var("MONITOR_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v != 0)
            .unwrap_or(10);
        let machine_history_limit = env::var("MONITOR_MACHINE_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MACHINE_HISTORY_LIMIT);
        let site_history_limit = env::var("MONITOR_SITE_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(SITE_HISTORY_LIMIT);
        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        Ok(Self {
            database_url,
            db_pool_size,
            bind_addr,
            machines,
            sites,
            weather_base_url,
            fetch_timeout_secs,
            machine_history_limit,
            site_history_limit,
            otlp_endpoint,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+asyncpg://") {
        return format!("postgresql://{stripped}");
    }
    url
}

fn parse_machine_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads the sites file; any failure falls back to the built-in list.
fn load_sites(path: &Path) -> Vec<SiteConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read sites file; using built-in sites"
            );
            return default_sites();
        }
    };
    let mut bytes = contents.into_bytes();
    match simd_json::serde::from_slice::<Vec<SiteConfig>>(&mut bytes) {
        Ok(sites) if !sites.is_empty() => sites,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "sites file is empty; using built-in sites");
            default_sites()
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse sites file; using built-in sites"
            );
            default_sites()
        }
    }
}

pub fn default_sites() -> Vec<SiteConfig> {
    [
        ("site-paris", "Paris", 48.8566, 2.3522),
        ("site-lyon", "Lyon", 45.7640, 4.8357),
        ("site-marseille", "Marseille", 43.2965, 5.3698),
    ]
    .into_iter()
    .map(|(name, display_city, latitude, longitude)| SiteConfig {
        name: name.to_string(),
        display_city: display_city.to_string(),
        latitude,
        longitude,
    })
    .collect()
}

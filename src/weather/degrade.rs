use super::{SiteConfig, WeatherProvider, METRIC_WEATHER_TEMPERATURE};
use crate::error::FetchError;
use crate::ingest::{IngestRequest, Reading, ReadingIngestor, SiteDetails};
use crate::stats::IngestStats;
use crate::store::{LatestState, StateStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one read for one site.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteReading {
    /// Live fetch succeeded and was ingested.
    Fetched(Reading),
    /// Live fetch failed; last stored snapshot served untouched.
    Cached { snapshot: LatestState, cause: String },
    /// Live fetch failed and nothing is stored for the site.
    Unavailable { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Active,
    Cached,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteView {
    pub name: String,
    pub display_city: String,
    pub temperature: f64,
    pub description: String,
    pub status: Availability,
    pub message: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl SiteView {
    pub fn render(site: &SiteConfig, reading: SiteReading) -> Self {
        match reading {
            SiteReading::Fetched(reading) => {
                let description = reading
                    .site
                    .as_ref()
                    .map(|details| details.description.clone())
                    .unwrap_or_default();
                SiteView {
                    name: site.name.clone(),
                    display_city: site.display_city.clone(),
                    temperature: reading.value,
                    description,
                    status: Availability::Active,
                    message: None,
                    last_seen: Some(reading.observed_at),
                }
            }
            SiteReading::Cached { snapshot, cause } => SiteView {
                name: site.name.clone(),
                display_city: snapshot
                    .display_city
                    .clone()
                    .unwrap_or_else(|| site.display_city.clone()),
                temperature: snapshot.value,
                description: snapshot.description.clone().unwrap_or_default(),
                status: Availability::Cached,
                message: Some(format!(
                    "{cause}; showing data from {}",
                    snapshot.last_seen.format("%Y-%m-%d %H:%M:%S")
                )),
                last_seen: Some(snapshot.last_seen),
            },
            SiteReading::Unavailable { message } => SiteView {
                name: site.name.clone(),
                display_city: site.display_city.clone(),
                temperature: 0.0,
                description: "N/A".to_string(),
                status: Availability::Error,
                message: Some(message),
                last_seen: None,
            },
        }
    }
}

/// Live fetch with cached and error fallbacks, recomputed on every read.
#[derive(Clone)]
pub struct DegradePath {
    provider: Arc<dyn WeatherProvider>,
    ingestor: ReadingIngestor,
    state: Arc<dyn StateStore>,
    timeout: Duration,
}

impl DegradePath {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        ingestor: ReadingIngestor,
        state: Arc<dyn StateStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            ingestor,
            state,
            timeout,
        }
    }

    pub async fn fetch_and_degrade(&self, site: &SiteConfig) -> SiteReading {
        let err = match self.fetch(site).await {
            Ok(reading) => return SiteReading::Fetched(reading),
            Err(err) => err,
        };

        let stats = self.ingestor.stats();
        IngestStats::bump(&stats.fetch_failures);
        tracing::warn!(site = %site.name, error = %err, "weather fetch failed; degrading");

        match self.state.get(&site.name).await {
            Ok(Some(snapshot)) => SiteReading::Cached {
                snapshot,
                cause: err.user_message(),
            },
            Ok(None) => SiteReading::Unavailable {
                message: err.user_message(),
            },
            Err(store_err) => {
                tracing::warn!(site = %site.name, error = %store_err, "cached state read failed");
                SiteReading::Unavailable {
                    message: err.user_message(),
                }
            }
        }
    }

    pub async fn view(&self, site: &SiteConfig) -> SiteView {
        SiteView::render(site, self.fetch_and_degrade(site).await)
    }

    async fn fetch(&self, site: &SiteConfig) -> Result<Reading, FetchError> {
        let current = tokio::time::timeout(self.timeout, self.provider.current(site))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let request = IngestRequest::site(
            site.name.clone(),
            METRIC_WEATHER_TEMPERATURE,
            current.temperature_c,
            current.observed_at,
            SiteDetails {
                display_name: site.display_city.clone(),
                description: current.description,
            },
        );
        self.ingestor.ingest(request).await.map_err(|err| {
            tracing::warn!(site = %site.name, error = %err, "provider returned an invalid reading");
            FetchError::Decode(err.to_string())
        })
    }
}

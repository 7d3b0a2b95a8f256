use super::{describe_weather_code, CurrentConditions, SiteConfig, WeatherProvider};
use crate::error::FetchError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrentPayload {
    current: Option<OpenMeteoCurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrentBlock {
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    weather_code: Option<i64>,
}

#[derive(Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoProvider {
    pub fn new(http: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current(&self, site: &SiteConfig) -> Result<CurrentConditions, FetchError> {
        let response = self
            .http
            .get(format!("{}/v1/forecast", self.base_url))
            .query(&[
                ("latitude", site.latitude.to_string()),
                ("longitude", site.longitude.to_string()),
                ("current", "temperature_2m,weather_code".to_string()),
                ("timezone", "UTC".to_string()),
                ("temperature_unit", "celsius".to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(site = %site.name, "Open-Meteo current HTTP {status}: {body}");
            return Err(FetchError::Status(status.as_u16()));
        }

        let payload: OpenMeteoCurrentPayload = response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        let current = payload
            .current
            .ok_or_else(|| FetchError::Decode("missing current block".to_string()))?;
        let temperature_c = current
            .temperature_2m
            .filter(|value| value.is_finite())
            .ok_or_else(|| FetchError::Decode("missing temperature_2m".to_string()))?;
        let description = current
            .weather_code
            .map(describe_weather_code)
            .unwrap_or("Unknown conditions")
            .to_string();

        Ok(CurrentConditions {
            temperature_c,
            description,
            observed_at: Utc::now(),
        })
    }
}

mod degrade;
mod open_meteo;

pub use degrade::{Availability, DegradePath, SiteReading, SiteView};
pub use open_meteo::OpenMeteoProvider;

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const METRIC_WEATHER_TEMPERATURE: &str = "temperature";

/// A remote site whose conditions are fetched on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub display_city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub description: String,
    pub observed_at: DateTime<Utc>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, site: &SiteConfig) -> Result<CurrentConditions, FetchError>;
}

/// Human label for a WMO weather interpretation code.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow fall",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown conditions",
    }
}

use crate::classify::{classify, Status};
use crate::error::ValidationError;
use crate::history::{HistoryEntry, HistorySubject};
use crate::store::LatestState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value as submitted by a client: a JSON number or numeric text from a form field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    pub(in crate::ingest) fn parse(&self) -> Result<f64, ValidationError> {
        let value = match self {
            RawValue::Number(value) => *value,
            RawValue::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ValidationError::NotNumeric(raw.clone()))?,
        };
        if !value.is_finite() {
            return Err(ValidationError::NotFinite(value));
        }
        Ok(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDetails {
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "machine_id")]
    pub source_id: String,
    #[serde(alias = "metric_type", alias = "metric")]
    pub metric_name: String,
    #[serde(rename = "value")]
    pub raw_value: RawValue,
    #[serde(default, alias = "timestamp")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub site: Option<SiteDetails>,
}

impl IngestRequest {
    pub fn machine(
        source_id: impl Into<String>,
        metric_name: impl Into<String>,
        raw_value: impl Into<RawValue>,
        observed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            metric_name: metric_name.into(),
            raw_value: raw_value.into(),
            observed_at,
            site: None,
        }
    }

    pub fn site(
        site: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
        observed_at: DateTime<Utc>,
        details: SiteDetails,
    ) -> Self {
        Self {
            source_id: site.into(),
            metric_name: metric_name.into(),
            raw_value: RawValue::Number(value),
            observed_at: Some(observed_at),
            site: Some(details),
        }
    }

    /// Validates and classifies. No store is touched.
    pub(in crate::ingest) fn into_reading(self) -> Result<Reading, ValidationError> {
        let source_id = self.source_id.trim();
        if source_id.is_empty() {
            return Err(ValidationError::MissingSource);
        }
        let metric_name = self.metric_name.trim();
        if metric_name.is_empty() {
            return Err(ValidationError::MissingMetric);
        }
        let value = self.raw_value.parse()?;

        Ok(Reading {
            source_id: source_id.to_string(),
            metric_name: metric_name.to_string(),
            value,
            status: classify(value),
            observed_at: self.observed_at.unwrap_or_else(Utc::now),
            site: self.site,
        })
    }
}

/// One classified observation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub source_id: String,
    pub metric_name: String,
    pub value: f64,
    pub status: Status,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteDetails>,
}

impl Reading {
    pub fn latest_state(&self) -> LatestState {
        LatestState {
            value: self.value,
            status: self.status,
            last_seen: self.observed_at,
            metric: self.metric_name.clone(),
            description: self.site.as_ref().map(|site| site.description.clone()),
            display_city: self.site.as_ref().map(|site| site.display_name.clone()),
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        let subject = match &self.site {
            Some(site) => HistorySubject::Site {
                site: self.source_id.clone(),
                display_name: site.display_name.clone(),
            },
            None => HistorySubject::Machine {
                source_id: self.source_id.clone(),
            },
        };
        HistoryEntry {
            id: Uuid::new_v4(),
            subject,
            metric: self.metric_name.clone(),
            value: self.value,
            status: self.status,
            description: self.site.as_ref().map(|site| site.description.clone()),
            observed_at: self.observed_at,
        }
    }
}

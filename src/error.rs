use axum::http::StatusCode;
use std::fmt::Display;

/// Input rejected before any store is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("source_id is required")]
    MissingSource,
    #[error("metric_name is required")]
    MissingMetric,
    #[error("value {0:?} is not a number")]
    NotNumeric(String),
    #[error("value {0} is not finite")]
    NotFinite(f64),
    #[error("malformed reading: {0}")]
    MalformedBody(String),
}

/// A state store or history log call failed. Callers must not assume the write happened.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{store} unavailable: {detail}")]
    Unavailable { store: &'static str, detail: String },
}

impl StoreError {
    pub fn unavailable(store: &'static str, detail: impl Display) -> Self {
        Self::Unavailable {
            store,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn from_db(store: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |err| Self::unavailable(store, err)
    }
}

/// Live fetch from an external source failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("name resolution failed: {0}")]
    Resolve(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("failed to decode provider payload: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Message shown to users when nothing is cached for the site.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Timeout | FetchError::Connect(_) => {
                "Weather service timed out or refused the connection".to_string()
            }
            FetchError::Resolve(_) => {
                "Cannot resolve the weather service host (DNS failure)".to_string()
            }
            FetchError::Status(code) => format!("Weather service returned HTTP {code}"),
            FetchError::Decode(_) | FetchError::Other(_) => GENERIC_FETCH_MESSAGE.to_string(),
        }
    }
}

pub const GENERIC_FETCH_MESSAGE: &str = "Weather service unreachable, check network connectivity";

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchError::Status(status.as_u16());
        }
        if err.is_decode() {
            return FetchError::Decode(err.to_string());
        }
        let chain = error_chain(&err);
        if looks_like_dns_failure(&chain) {
            return FetchError::Resolve(chain);
        }
        if err.is_connect() {
            return FetchError::Connect(chain);
        }
        FetchError::Other(chain)
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

fn looks_like_dns_failure(chain: &str) -> bool {
    let lowered = chain.to_ascii_lowercase();
    lowered.contains("dns error")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
        || lowered.contains("nodename nor servname")
}

pub fn bad_request(err: impl Display) -> (StatusCode, String) {
    tracing::debug!(error = %err, "rejected request");
    (StatusCode::BAD_REQUEST, err.to_string())
}

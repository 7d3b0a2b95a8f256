use serde::{Deserialize, Serialize};
use std::fmt;

pub const WARNING_ABOVE: f64 = 50.0;
pub const CRITICAL_ABOVE: f64 = 80.0;

/// Severity tier of a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Normal,
    Warning,
    Critical,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Normal => "NORMAL",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Status::Normal),
            "WARNING" => Some(Status::Warning),
            "CRITICAL" => Some(Status::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(value: f64) -> Status {
    if value > CRITICAL_ABOVE {
        Status::Critical
    } else if value > WARNING_ABOVE {
        Status::Warning
    } else {
        Status::Normal
    }
}

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a system log entry. The string forms are wire-visible and
/// stored verbatim in the `logs.log_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
    Maintenance,
    MlAnalysis,
    Disease,
    Deficiency,
    Alert,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Maintenance => "Maintenance",
            LogCategory::MlAnalysis => "MLAnalysis",
            LogCategory::Disease => "Disease",
            LogCategory::Deficiency => "Deficiency",
            LogCategory::Alert => "Alert",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Maintenance" => Ok(LogCategory::Maintenance),
            "MLAnalysis" => Ok(LogCategory::MlAnalysis),
            "Disease" => Ok(LogCategory::Disease),
            "Deficiency" => Ok(LogCategory::Deficiency),
            "Alert" => Ok(LogCategory::Alert),
            other => Err(anyhow!("unknown log category {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Option<i64>,
    pub category: LogCategory,
    pub title: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

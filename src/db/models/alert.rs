use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an alert shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    Info,
    Warning,
    Critical,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Info => "Info",
            AlertKind::Warning => "Warning",
            AlertKind::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Info" => Ok(AlertKind::Info),
            "Warning" => Ok(AlertKind::Warning),
            "Critical" => Ok(AlertKind::Critical),
            other => Err(anyhow!("unknown alert kind {other:?}")),
        }
    }
}

/// One row of `alerts`. New alerts start unread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Option<i64>,
    pub kind: AlertKind,
    pub message: String,
    pub detail: Option<String>,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

mod alerts;
mod images;
mod logs;
mod predictions;
mod readings;
mod recommendations;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub(crate) fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

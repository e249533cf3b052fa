use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::parse_datetime;
use crate::db::models::{LogCategory, LogEntry};
use crate::db::Store;

fn row_to_log(row: &Row) -> Result<LogEntry> {
    let timestamp: String = row.get("timestamp")?;
    let category: String = row.get("log_type")?;
    Ok(LogEntry {
        id: row.get("id")?,
        category: LogCategory::parse(&category)?,
        title: row.get("message")?,
        detail: row.get("details")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

impl Store {
    pub fn insert_log(
        &self,
        category: LogCategory,
        title: &str,
        detail: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO logs (log_type, message, details, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![category.as_str(), title, detail, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn recent_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, log_type, message, details, timestamp
             FROM logs
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(row_to_log(row)?);
        }
        Ok(entries)
    }
}

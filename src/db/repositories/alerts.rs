use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::parse_datetime;
use crate::db::models::{Alert, AlertKind};
use crate::db::Store;

impl Store {
    pub fn insert_alert(
        &self,
        kind: AlertKind,
        message: &str,
        detail: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO alerts (type, message, details, is_read, timestamp)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![kind.as_str(), message, detail, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Unread alerts, newest first, through the dashboard view.
    pub fn unread_alerts(&self) -> Result<Vec<Alert>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, type, message, details, timestamp FROM vw_unread_alerts",
        )?;
        let mut rows = stmt.query([])?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get("type")?;
            let timestamp: String = row.get("timestamp")?;
            alerts.push(Alert {
                id: row.get("id")?,
                kind: AlertKind::parse(&kind)?,
                message: row.get("message")?,
                detail: row.get("details")?,
                read: false,
                timestamp: parse_datetime(&timestamp, "timestamp")?,
            });
        }
        Ok(alerts)
    }

    /// Returns `false` when the alert does not exist.
    pub fn mark_alert_read(&self, alert_id: i64) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE alerts SET is_read = 1 WHERE id = ?1",
            params![alert_id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_start_unread_and_can_be_acknowledged() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_alert(
                AlertKind::Critical,
                "Disease detected with 82% confidence",
                None,
                Utc::now(),
            )
            .unwrap();

        let unread = store.unread_alerts().unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, AlertKind::Critical);

        let id = unread[0].id.unwrap();
        assert!(store.mark_alert_read(id).unwrap());
        assert!(store.unread_alerts().unwrap().is_empty());
        assert!(!store.mark_alert_read(9999).unwrap());
    }
}

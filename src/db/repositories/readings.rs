use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::parse_datetime;
use crate::db::models::{DailySummary, SensorReading};
use crate::db::Store;

fn row_to_reading(row: &Row) -> Result<SensorReading> {
    let timestamp: String = row.get("timestamp")?;
    Ok(SensorReading {
        id: row.get("id").ok(),
        temperature: row.get("temperature")?,
        ph: row.get("ph")?,
        ec: row.get("ec")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

impl Store {
    pub fn insert_sensor_reading(
        &self,
        temperature: f64,
        ph: f64,
        ec: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sensor_readings (temperature, ph, ec, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![temperature, ph, ec, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most recent reading, through the dashboard view.
    pub fn latest_sensor_reading(&self) -> Result<Option<SensorReading>> {
        let mut stmt = self.conn().prepare(
            "SELECT temperature, ph, ec, timestamp FROM vw_latest_sensor_reading",
        )?;
        let mut rows = stmt.query([])?;
        let reading = match rows.next()? {
            Some(row) => {
                let timestamp: String = row.get("timestamp")?;
                Some(SensorReading {
                    id: None,
                    temperature: row.get("temperature")?,
                    ph: row.get("ph")?,
                    ec: row.get("ec")?,
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                })
            }
            None => None,
        };
        Ok(reading)
    }

    pub fn recent_sensor_readings(&self, limit: u32) -> Result<Vec<SensorReading>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, temperature, ph, ec, timestamp
             FROM sensor_readings
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut readings = Vec::new();
        while let Some(row) = rows.next()? {
            readings.push(row_to_reading(row)?);
        }
        Ok(readings)
    }

    /// Per-day averages, newest first, through the dashboard view.
    pub fn daily_sensor_summary(&self, limit: u32) -> Result<Vec<DailySummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT day, avg_temp, avg_ph, avg_ec FROM vw_daily_sensor_summary LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(DailySummary {
                day: row.get("day")?,
                avg_temp: row.get("avg_temp")?,
                avg_ph: row.get("avg_ph")?,
                avg_ec: row.get("avg_ec")?,
            });
        }
        Ok(summaries)
    }

    pub fn sensor_reading_count(&self) -> Result<i64> {
        let count =
            self.conn()
                .query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_reading_tracks_inserts() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.latest_sensor_reading().unwrap().is_none());

        let now = Utc::now();
        store.insert_sensor_reading(21.0, 6.0, 700.0, now).unwrap();
        store.insert_sensor_reading(22.5, 5.9, 710.0, now).unwrap();

        let latest = store.latest_sensor_reading().unwrap().unwrap();
        assert_eq!(latest.temperature, 22.5);
        assert_eq!(latest.ec, 710.0);
        assert_eq!(store.sensor_reading_count().unwrap(), 2);
    }

    #[test]
    fn daily_summary_averages_by_day() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert_sensor_reading(20.0, 6.0, 600.0, now).unwrap();
        store.insert_sensor_reading(24.0, 6.4, 800.0, now).unwrap();

        let summary = store.daily_sensor_summary(30).unwrap();
        assert_eq!(summary.len(), 1);
        assert!((summary[0].avg_temp - 22.0).abs() < 1e-9);
        assert!((summary[0].avg_ec - 700.0).abs() < 1e-9);
    }
}

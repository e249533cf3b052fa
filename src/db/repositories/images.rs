use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::parse_datetime;
use crate::db::models::PlantImage;
use crate::db::Store;

impl Store {
    pub fn insert_image(
        &self,
        filename: &str,
        filepath: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO plant_images (filename, filepath, timestamp)
             VALUES (?1, ?2, ?3)",
            params![filename, filepath, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn latest_image(&self) -> Result<Option<PlantImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, filename, filepath, timestamp
             FROM plant_images
             ORDER BY id DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        let image = match rows.next()? {
            Some(row) => {
                let timestamp: String = row.get("timestamp")?;
                Some(PlantImage {
                    id: row.get("id")?,
                    filename: row.get("filename")?,
                    filepath: row.get("filepath")?,
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                })
            }
            None => None,
        };
        Ok(image)
    }

    pub fn image_count(&self) -> Result<i64> {
        let count =
            self.conn()
                .query_row("SELECT COUNT(*) FROM plant_images", [], |row| row.get(0))?;
        Ok(count)
    }
}

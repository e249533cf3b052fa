use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::parse_datetime;
use crate::db::models::Prediction;
use crate::db::Store;

impl Store {
    /// Appends a prediction joined to the most recent image row carrying
    /// `filename`. Returns `false` when no such image exists: the
    /// prediction is silently rejected, matching the append-only contract.
    pub fn insert_prediction(
        &self,
        filename: &str,
        label: &str,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT INTO ml_predictions (image_id, prediction_label, confidence, timestamp)
             SELECT id, ?2, ?3, ?4
             FROM plant_images
             WHERE filename = ?1
             ORDER BY id DESC
             LIMIT 1",
            params![filename, label, confidence, timestamp.to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    pub fn latest_prediction(&self) -> Result<Option<Prediction>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, image_id, prediction_label, confidence, timestamp
             FROM ml_predictions
             ORDER BY id DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        let prediction = match rows.next()? {
            Some(row) => {
                let timestamp: String = row.get("timestamp")?;
                Some(Prediction {
                    id: row.get("id")?,
                    image_id: row.get("image_id")?,
                    label: row.get("prediction_label")?,
                    confidence: row.get("confidence")?,
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                })
            }
            None => None,
        };
        Ok(prediction)
    }

    pub fn prediction_count(&self) -> Result<i64> {
        let count =
            self.conn()
                .query_row("SELECT COUNT(*) FROM ml_predictions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_joins_most_recent_image_by_filename() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();

        store
            .insert_image("plant_a.jpg", "/gallery/plant_a.jpg", now)
            .unwrap();
        store
            .insert_image("plant_a.jpg", "/gallery/retake/plant_a.jpg", now)
            .unwrap();

        assert!(store
            .insert_prediction("plant_a.jpg", "Disease", 0.82, now)
            .unwrap());

        let pred = store.latest_prediction().unwrap().unwrap();
        let latest_image = store.latest_image().unwrap().unwrap();
        assert_eq!(pred.image_id, latest_image.id.unwrap());
        assert_eq!(pred.label, "Disease");
    }

    #[test]
    fn prediction_without_parent_image_is_rejected_silently() {
        let store = Store::open_in_memory().unwrap();
        let accepted = store
            .insert_prediction("missing.jpg", "Healthy", 0.9, Utc::now())
            .unwrap();
        assert!(!accepted);
        assert_eq!(store.prediction_count().unwrap(), 0);
    }
}

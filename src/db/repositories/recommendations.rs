use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::parse_datetime;
use crate::db::models::{RecKind, Recommendation};
use crate::db::Store;

impl Store {
    /// Appends a recommendation joined to the most recent prediction for
    /// `filename`. Returns `false` when no prediction exists for it.
    pub fn insert_recommendation(
        &self,
        filename: &str,
        kind: RecKind,
        text: &str,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT INTO ml_recommendations
                 (prediction_id, recommendation_type, recommendation_text, confidence, timestamp)
             SELECT p.id, ?2, ?3, ?4, ?5
             FROM ml_predictions p
             JOIN plant_images i ON p.image_id = i.id
             WHERE i.filename = ?1
             ORDER BY p.id DESC
             LIMIT 1",
            params![
                filename,
                kind.as_str(),
                text,
                confidence,
                timestamp.to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn unacknowledged_recommendations(&self) -> Result<Vec<Recommendation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, prediction_id, recommendation_type, recommendation_text,
                    confidence, user_acknowledged, timestamp
             FROM ml_recommendations
             WHERE user_acknowledged = 0
             ORDER BY id DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut recs = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get("recommendation_type")?;
            let timestamp: String = row.get("timestamp")?;
            recs.push(Recommendation {
                id: row.get("id")?,
                prediction_id: row.get("prediction_id")?,
                kind: RecKind::parse(&kind)?,
                text: row.get("recommendation_text")?,
                confidence: row.get("confidence")?,
                acknowledged: false,
                timestamp: parse_datetime(&timestamp, "timestamp")?,
            });
        }
        Ok(recs)
    }

    pub fn acknowledge_recommendation(&self, rec_id: i64) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE ml_recommendations SET user_acknowledged = 1 WHERE id = ?1",
            params![rec_id],
        )?;
        Ok(changed > 0)
    }

    pub fn recommendation_count(&self) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM ml_recommendations",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_joins_latest_prediction_for_filename() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();

        store
            .insert_image("plant_b.jpg", "/gallery/plant_b.jpg", now)
            .unwrap();
        store
            .insert_prediction("plant_b.jpg", "Deficiency", 0.61, now)
            .unwrap();

        assert!(store
            .insert_recommendation(
                "plant_b.jpg",
                RecKind::Deficiency,
                "Mild deficiency: apply a light nutrient supplement.",
                0.61,
                now,
            )
            .unwrap());

        let recs = store.unacknowledged_recommendations().unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecKind::Deficiency);

        let id = recs[0].id.unwrap();
        assert!(store.acknowledge_recommendation(id).unwrap());
        assert!(store.unacknowledged_recommendations().unwrap().is_empty());
    }

    #[test]
    fn recommendation_without_prediction_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let accepted = store
            .insert_recommendation("nope.jpg", RecKind::Healthy, "text", 0.9, Utc::now())
            .unwrap();
        assert!(!accepted);
        assert_eq!(store.recommendation_count().unwrap(), 0);
    }
}

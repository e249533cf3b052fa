use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One classifier verdict persisted against a captured image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Option<i64>,
    pub image_id: i64,
    pub label: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

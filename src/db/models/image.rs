use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured plant image. The row references the JPEG on disk; deleting
/// the row does not delete the file (the gallery browser reads files
/// directly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantImage {
    pub id: Option<i64>,
    pub filename: String,
    pub filepath: String,
    pub timestamp: DateTime<Utc>,
}

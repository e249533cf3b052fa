use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad class of a care recommendation, mirroring the classifier classes
/// plus the out-of-distribution bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecKind {
    Healthy,
    Deficiency,
    Disease,
    Pest,
    Unknown,
}

impl RecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecKind::Healthy => "Healthy",
            RecKind::Deficiency => "Deficiency",
            RecKind::Disease => "Disease",
            RecKind::Pest => "Pest",
            RecKind::Unknown => "Unknown",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Healthy" => Ok(RecKind::Healthy),
            "Deficiency" => Ok(RecKind::Deficiency),
            "Disease" => Ok(RecKind::Disease),
            "Pest" => Ok(RecKind::Pest),
            "Unknown" => Ok(RecKind::Unknown),
            other => Err(anyhow!("unknown recommendation kind {other:?}")),
        }
    }
}

/// One row of `ml_recommendations`, joined to the prediction it explains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Option<i64>,
    pub prediction_id: i64,
    pub kind: RecKind,
    pub text: String,
    pub confidence: f64,
    pub acknowledged: bool,
    pub timestamp: DateTime<Utc>,
}

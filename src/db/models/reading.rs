//! Sensor reading rows and the daily aggregate exposed to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One environmental snapshot as persisted in `sensor_readings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Option<i64>,
    pub temperature: f64,
    pub ph: f64,
    pub ec: f64,
    pub timestamp: DateTime<Utc>,
}

/// One row of `vw_daily_sensor_summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub day: String,
    pub avg_temp: f64,
    pub avg_ph: f64,
    pub avg_ec: f64,
}

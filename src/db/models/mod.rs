mod alert;
mod image;
mod log_entry;
mod prediction;
mod reading;
mod recommendation;

pub use alert::{Alert, AlertKind};
pub use image::PlantImage;
pub use log_entry::{LogCategory, LogEntry};
pub use prediction::Prediction;
pub use reading::{DailySummary, SensorReading};
pub use recommendation::{RecKind, Recommendation};

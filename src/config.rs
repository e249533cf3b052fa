//! Engine configuration: a JSON file with every field defaulted, so a
//! missing or partial file still yields a runnable engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ml::OodThresholds;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Heartbeat interval in seconds.
    pub tick_period_secs: f64,
    /// Ticks between sensor passes.
    pub sensor_period_ticks: u32,
    /// Ticks between camera captures.
    pub camera_period_ticks: u32,

    /// Upper entropy bound for a valid plant image.
    pub entropy_threshold: f32,
    /// Lower confidence bound for a valid plant image.
    pub min_confidence: f32,
    /// Lower green-pixel-ratio bound for a valid plant image.
    pub min_green_ratio: f32,
    /// Square model input side.
    pub image_size: u32,

    pub gallery_dir: PathBuf,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    pub model_name: String,

    /// When set, the dispatcher's per-tick mass turn-off also covers the
    /// heater (the source behavior). Off by default: forcing the heater
    /// off every tick would fight the hysteresis law.
    pub auto_off_heater: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_secs: 5.0,
            sensor_period_ticks: 10,
            camera_period_ticks: 900,
            entropy_threshold: 1.8,
            min_confidence: 0.30,
            min_green_ratio: 0.10,
            image_size: 224,
            gallery_dir: PathBuf::from("/opt/leafsense/gallery"),
            db_path: PathBuf::from("/opt/leafsense/leafsense.db"),
            model_dir: PathBuf::from("/opt/leafsense/models"),
            model_name: "leafsense_model.safetensors".to_string(),
            auto_off_heater: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_period_secs)
    }

    pub fn ood_thresholds(&self) -> OodThresholds {
        OodThresholds {
            entropy: self.entropy_threshold,
            min_confidence: self.min_confidence,
            min_green_ratio: self.min_green_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_period(), Duration::from_secs(5));
        assert_eq!(config.sensor_period_ticks, 10);
        assert_eq!(config.camera_period_ticks, 900);
        assert_eq!(config.image_size, 224);
        assert!(!config.auto_off_heater);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = std::env::temp_dir().join(format!(
            "leafsense_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "tick_period_secs": 1.5, "sensor_period_ticks": 3 }"#)
            .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.tick_period(), Duration::from_millis(1500));
        assert_eq!(config.sensor_period_ticks, 3);
        assert_eq!(config.camera_period_ticks, 900);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn garbage_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "leafsense_config_bad_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(EngineConfig::load(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}

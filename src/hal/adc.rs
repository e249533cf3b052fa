//! ADC access for the analog probes (pH, EC).
//!
//! The ADS1115 sits behind the kernel IIO driver, which exposes one
//! `in_voltage<N>_raw` file per channel plus a shared `in_voltage_scale`
//! (millivolts per LSB). The probes share one converter, so the source is
//! handed out behind a lock.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rand::random_range;

/// Something that can produce a voltage for an ADC channel.
pub trait VoltageSource: Send {
    fn read_voltage(&mut self, channel: u8) -> Result<f64>;
}

/// An ADC shared between several probe sensors.
#[derive(Clone)]
pub struct SharedVoltageSource {
    inner: Arc<Mutex<Box<dyn VoltageSource>>>,
}

impl SharedVoltageSource {
    pub fn new(source: Box<dyn VoltageSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    pub fn read_voltage(&self, channel: u8) -> Result<f64> {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.read_voltage(channel)
    }
}

/// ADS1115 through the Linux IIO sysfs interface.
pub struct IioAdc {
    device_dir: PathBuf,
}

impl IioAdc {
    /// `device_dir` is an IIO device directory, e.g.
    /// `/sys/bus/iio/devices/iio:device0`.
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.device_dir.exists()
    }
}

impl VoltageSource for IioAdc {
    fn read_voltage(&mut self, channel: u8) -> Result<f64> {
        let raw_path = self.device_dir.join(format!("in_voltage{channel}_raw"));
        let scale_path = self.device_dir.join("in_voltage_scale");

        let raw: f64 = std::fs::read_to_string(&raw_path)
            .with_context(|| format!("failed to read {}", raw_path.display()))?
            .trim()
            .parse()
            .context("ADC raw value is not a number")?;
        let scale_mv: f64 = std::fs::read_to_string(&scale_path)
            .with_context(|| format!("failed to read {}", scale_path.display()))?
            .trim()
            .parse()
            .context("ADC scale value is not a number")?;

        Ok(raw * scale_mv / 1000.0)
    }
}

/// Simulated ADC: a fixed center voltage per channel plus uniform noise.
pub struct MockAdc {
    centers: [f64; 4],
    noise: f64,
}

impl MockAdc {
    pub fn new(centers: [f64; 4], noise: f64) -> Self {
        Self { centers, noise }
    }
}

impl Default for MockAdc {
    fn default() -> Self {
        // Chosen so the derived pH/EC readings land around their ideal bands.
        Self::new([1.71, 0.7, 0.0, 0.0], 0.05)
    }
}

impl VoltageSource for MockAdc {
    fn read_voltage(&mut self, channel: u8) -> Result<f64> {
        let center = self.centers[channel as usize % 4];
        Ok(center + random_range(-self.noise..self.noise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iio_reads_raw_times_scale() {
        let dir = std::env::temp_dir().join(format!("leafsense_iio_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("in_voltage0_raw"), "13653\n").unwrap();
        std::fs::write(dir.join("in_voltage_scale"), "0.125\n").unwrap();

        let mut adc = IioAdc::new(&dir);
        let volts = adc.read_voltage(0).unwrap();
        assert!((volts - 1.7066).abs() < 1e-3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_device_is_an_error() {
        let mut adc = IioAdc::new("/nonexistent/iio:device9");
        assert!(!adc.is_present());
        assert!(adc.read_voltage(0).is_err());
    }
}

//! DS18B20 water temperature sensor over the kernel 1-Wire bus.
//!
//! The kernel exposes each probe as
//! `/sys/bus/w1/devices/<address>/w1_slave`; the file carries a CRC line
//! (`... crc=da YES`) and a reading line (`... t=23125`, millidegrees).

use std::path::PathBuf;

use log::{info, warn};

use super::Sensor;

const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// Mid-range fallback sample returned while the bus is failing.
const FALLBACK_C: f64 = 21.0;

pub struct Ds18b20 {
    device_path: PathBuf,
    failing: bool,
}

impl Ds18b20 {
    /// `address` is the 1-Wire id, e.g. `28-0301a2799b1e`. Construction only
    /// records the path; presence is probed on every read so a probe plugged
    /// in later is picked up.
    pub fn new(address: &str) -> Self {
        Self {
            device_path: PathBuf::from(W1_DEVICES_DIR)
                .join(address)
                .join("w1_slave"),
            failing: false,
        }
    }

    pub fn is_present(&self) -> bool {
        self.device_path.exists()
    }

    fn read_hw(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.device_path).ok()?;
        let mut lines = raw.lines();

        // CRC line must end in YES or the conversion is garbage.
        let crc_line = lines.next()?;
        if !crc_line.trim_end().ends_with("YES") {
            return None;
        }

        let temp_line = lines.next()?;
        let millidegrees: f64 = temp_line.rsplit("t=").next()?.trim().parse().ok()?;
        Some(millidegrees / 1000.0)
    }
}

impl Sensor for Ds18b20 {
    fn name(&self) -> &'static str {
        "Temp"
    }

    fn read(&mut self) -> f64 {
        match self.read_hw() {
            Some(celsius) => {
                if self.failing {
                    info!("[Temp] 1-Wire bus recovered");
                    self.failing = false;
                }
                celsius
            }
            None => {
                if !self.failing {
                    warn!(
                        "[Temp] cannot read {}; returning fallback {FALLBACK_C} C",
                        self.device_path.display()
                    );
                    self.failing = true;
                }
                FALLBACK_C
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_returned_while_bus_is_absent() {
        let mut sensor = Ds18b20::new("28-does-not-exist");
        assert!(!sensor.is_present());
        assert_eq!(sensor.read(), FALLBACK_C);
        // Second failed read is part of the same burst.
        assert_eq!(sensor.read(), FALLBACK_C);
    }

    #[test]
    fn parses_kernel_w1_slave_format() {
        let dir = std::env::temp_dir().join(format!(
            "leafsense_w1_{}/28-test",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("w1_slave"),
            "6e 01 4b 46 7f ff 02 10 da : crc=da YES\n6e 01 4b 46 7f ff 02 10 da t=22875\n",
        )
        .unwrap();

        let mut sensor = Ds18b20::new("28-test");
        sensor.device_path = dir.join("w1_slave");
        assert_eq!(sensor.read(), 22.875);

        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn failed_crc_falls_back() {
        let dir = std::env::temp_dir().join(format!(
            "leafsense_w1_crc_{}/28-test",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("w1_slave"),
            "6e 01 4b 46 7f ff 02 10 da : crc=da NO\n6e 01 4b 46 7f ff 02 10 da t=22875\n",
        )
        .unwrap();

        let mut sensor = Ds18b20::new("28-test");
        sensor.device_path = dir.join("w1_slave");
        assert_eq!(sensor.read(), FALLBACK_C);

        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }
}

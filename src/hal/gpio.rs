//! GPIO output switch over the kernel sysfs interface (heater relay and
//! dosing pumps). Idle level is off.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use super::Switch;

const GPIO_ROOT: &str = "/sys/class/gpio";

pub struct GpioSwitch {
    name: &'static str,
    value_path: PathBuf,
    on: bool,
    failing: bool,
}

impl GpioSwitch {
    /// Exports the pin if needed, sets it to output, and drives it low.
    /// Callers downgrade to a [`super::NullSwitch`] when this fails.
    pub fn probe(name: &'static str, pin: u32) -> Result<Self> {
        Self::probe_at(name, pin, Path::new(GPIO_ROOT))
    }

    fn probe_at(name: &'static str, pin: u32, root: &Path) -> Result<Self> {
        let pin_dir = root.join(format!("gpio{pin}"));
        if !pin_dir.exists() {
            let export = root.join("export");
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .open(&export)
                .with_context(|| format!("failed to open {}", export.display()))?;
            write!(file, "{pin}")
                .with_context(|| format!("failed to export GPIO pin {pin}"))?;
        }

        std::fs::write(pin_dir.join("direction"), "out")
            .with_context(|| format!("failed to set GPIO pin {pin} to output"))?;

        let value_path = pin_dir.join("value");
        std::fs::write(&value_path, "0")
            .with_context(|| format!("failed to drive GPIO pin {pin} low"))?;

        Ok(Self {
            name,
            value_path,
            on: false,
            failing: false,
        })
    }
}

impl Switch for GpioSwitch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        match std::fs::write(&self.value_path, if on { "1" } else { "0" }) {
            Ok(()) => {
                self.on = on;
                self.failing = false;
            }
            Err(err) => {
                if !self.failing {
                    warn!(
                        "[{}] GPIO write to {} failed: {err}",
                        self.name,
                        self.value_path.display()
                    );
                    self.failing = true;
                }
            }
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

impl Drop for GpioSwitch {
    fn drop(&mut self) {
        // Leave the line at idle level.
        let _ = std::fs::write(&self.value_path, "0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_against_fake_sysfs_tree() {
        let root = std::env::temp_dir().join(format!("leafsense_gpio_{}", std::process::id()));
        let pin_dir = root.join("gpio26");
        std::fs::create_dir_all(&pin_dir).unwrap();
        std::fs::write(root.join("export"), "").unwrap();
        std::fs::write(pin_dir.join("direction"), "").unwrap();
        std::fs::write(pin_dir.join("value"), "").unwrap();

        let mut switch = GpioSwitch::probe_at("Heater", 26, &root).unwrap();
        assert!(!switch.is_on());

        switch.set(true);
        assert!(switch.is_on());
        assert_eq!(std::fs::read_to_string(pin_dir.join("value")).unwrap(), "1");

        switch.set(false);
        assert_eq!(std::fs::read_to_string(pin_dir.join("value")).unwrap(), "0");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn probe_fails_without_sysfs() {
        let root = std::env::temp_dir().join("leafsense_gpio_missing");
        assert!(GpioSwitch::probe_at("Heater", 26, &root).is_err());
    }
}

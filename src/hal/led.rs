//! Alert LED behind the custom character device (`/dev/led0`).
//!
//! The device is opened on every write so the engine starts even when the
//! kernel module is loaded later. Two tasks write the LED (the periodic
//! controller and the inference task); last writer wins.

use std::io::Write;
use std::path::PathBuf;

use log::warn;

use super::Switch;

pub const DEFAULT_LED_DEVICE: &str = "/dev/led0";

pub struct AlertLed {
    device_path: PathBuf,
    on: bool,
    failing: bool,
}

impl AlertLed {
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
            on: false,
            failing: false,
        }
    }

    fn write_value(&mut self, value: &str) {
        let result = std::fs::OpenOptions::new()
            .write(true)
            .open(&self.device_path)
            .and_then(|mut file| file.write_all(value.as_bytes()));

        match result {
            Ok(()) => self.failing = false,
            Err(err) => {
                if !self.failing {
                    warn!(
                        "[AlertLed] cannot write {}: {err}. Is the kernel module loaded?",
                        self.device_path.display()
                    );
                    self.failing = true;
                }
            }
        }
    }
}

impl Switch for AlertLed {
    fn name(&self) -> &'static str {
        "AlertLed"
    }

    fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        self.write_value(if on { "1" } else { "0" });
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

impl Drop for AlertLed {
    fn drop(&mut self) {
        // LED off when the engine goes away.
        if self.on {
            self.write_value("0");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_and_zero_to_the_device() {
        let path = std::env::temp_dir().join(format!("leafsense_led_{}", std::process::id()));
        std::fs::write(&path, "").unwrap();

        let mut led = AlertLed::new(&path);
        led.set(true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
        led.set(false);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_device_is_not_fatal() {
        let mut led = AlertLed::new("/nonexistent/led0");
        led.set(true);
        assert!(led.is_on());
    }
}

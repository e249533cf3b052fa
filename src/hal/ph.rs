//! Analog pH probe read through a shared ADC channel.

use log::{info, warn};

use super::adc::SharedVoltageSource;
use super::Sensor;

/// Mid-range fallback sample returned while the bus is failing.
const FALLBACK_PH: f64 = 6.0;

/// Linear probe calibration: `ph = slope * volts + offset`. Defaults match
/// a common 0–3 V amplifier board centered on pH 7 at 1.5 V.
#[derive(Debug, Clone, Copy)]
pub struct PhCalibration {
    pub slope: f64,
    pub offset: f64,
}

impl Default for PhCalibration {
    fn default() -> Self {
        Self {
            slope: -3.5,
            offset: 12.25,
        }
    }
}

pub struct PhProbe {
    adc: SharedVoltageSource,
    channel: u8,
    calibration: PhCalibration,
    failing: bool,
}

impl PhProbe {
    pub fn new(adc: SharedVoltageSource, channel: u8, calibration: PhCalibration) -> Self {
        Self {
            adc,
            channel,
            calibration,
            failing: false,
        }
    }
}

impl Sensor for PhProbe {
    fn name(&self) -> &'static str {
        "PH"
    }

    fn read(&mut self) -> f64 {
        match self.adc.read_voltage(self.channel) {
            Ok(volts) => {
                if self.failing {
                    info!("[PH] ADC recovered");
                    self.failing = false;
                }
                let ph = self.calibration.slope * volts + self.calibration.offset;
                ph.clamp(0.0, 14.0)
            }
            Err(err) => {
                if !self.failing {
                    warn!("[PH] ADC read failed ({err:#}); returning fallback {FALLBACK_PH}");
                    self.failing = true;
                }
                FALLBACK_PH
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockAdc;

    #[test]
    fn voltage_maps_through_calibration() {
        let adc = SharedVoltageSource::new(Box::new(MockAdc::new([1.5, 0.0, 0.0, 0.0], 0.0)));
        let mut probe = PhProbe::new(adc, 0, PhCalibration::default());
        let ph = probe.read();
        assert!((ph - 7.0).abs() < 1e-9);
    }

    #[test]
    fn reading_is_clamped_to_ph_scale() {
        let adc = SharedVoltageSource::new(Box::new(MockAdc::new([100.0, 0.0, 0.0, 0.0], 0.0)));
        let mut probe = PhProbe::new(adc, 0, PhCalibration::default());
        assert_eq!(probe.read(), 0.0);
    }
}

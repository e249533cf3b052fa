//! Electrical-conductivity (TDS) probe read through a shared ADC channel.

use log::{info, warn};

use super::adc::SharedVoltageSource;
use super::Sensor;

/// Mid-range fallback sample (µS/cm) returned while the bus is failing.
const FALLBACK_EC: f64 = 700.0;

/// Linear probe calibration: `ec_us_cm = slope * volts`. The default slope
/// puts a 0.7 V reading at 700 µS/cm, the center of the lettuce band.
#[derive(Debug, Clone, Copy)]
pub struct EcCalibration {
    pub slope: f64,
}

impl Default for EcCalibration {
    fn default() -> Self {
        Self { slope: 1000.0 }
    }
}

pub struct EcProbe {
    adc: SharedVoltageSource,
    channel: u8,
    calibration: EcCalibration,
    failing: bool,
}

impl EcProbe {
    pub fn new(adc: SharedVoltageSource, channel: u8, calibration: EcCalibration) -> Self {
        Self {
            adc,
            channel,
            calibration,
            failing: false,
        }
    }
}

impl Sensor for EcProbe {
    fn name(&self) -> &'static str {
        "EC"
    }

    fn read(&mut self) -> f64 {
        match self.adc.read_voltage(self.channel) {
            Ok(volts) => {
                if self.failing {
                    info!("[EC] ADC recovered");
                    self.failing = false;
                }
                (self.calibration.slope * volts).max(0.0)
            }
            Err(err) => {
                if !self.failing {
                    warn!("[EC] ADC read failed ({err:#}); returning fallback {FALLBACK_EC}");
                    self.failing = true;
                }
                FALLBACK_EC
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
        let adc = SharedVoltageSource::new(Box::new(MockAdc::new([0.7, 0.0, 0.0, 0.0], 0.0)));
        let mut probe = EcProbe::new(adc, 0, EcCalibration::default());
        assert!((probe.read() - 700.0).abs() < 1e-9);
    }

    #[test]
    fn negative_voltage_clamps_to_zero() {
        let adc = SharedVoltageSource::new(Box::new(MockAdc::new([-0.2, 0.0, 0.0, 0.0], 0.0)));
        let mut probe = EcProbe::new(adc, 0, EcCalibration::default());
        assert_eq!(probe.read(), 0.0);
    }
}

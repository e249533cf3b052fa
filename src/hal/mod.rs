//! Sensor and actuator contracts, plus the in-process implementations used
//! when the real hardware is absent.
//!
//! Hardware constructors may probe (sysfs presence checks) but never spawn
//! tasks. A failed actuator probe downgrades to [`NullSwitch`] instead of
//! aborting startup; a failing sensor keeps returning an in-range fallback
//! sample and logs the failure once per burst.

mod adc;
mod ec;
mod gpio;
mod led;
mod ph;
mod temp;

pub use adc::{IioAdc, MockAdc, SharedVoltageSource, VoltageSource};
pub use ec::EcProbe;
pub use gpio::GpioSwitch;
pub use led::{AlertLed, DEFAULT_LED_DEVICE};
pub use ph::PhProbe;
pub use temp::Ds18b20;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use rand::random_range;

/// A read-only environmental sensor. `read` never fails at the contract:
/// hardware errors are recovered inside the implementation by returning a
/// fallback sample in the sensor's expected range.
pub trait Sensor: Send {
    fn name(&self) -> &'static str;
    fn read(&mut self) -> f64;
}

/// A two-state actuator (heater, pump, LED). `set` is idempotent: setting
/// the current state is a no-op and must not be reported as an edge by
/// callers tracking transitions.
pub trait Switch: Send {
    fn name(&self) -> &'static str;
    fn set(&mut self, on: bool);
    fn is_on(&self) -> bool;
}

/// The four controlled actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Heater,
    PhUp,
    PhDown,
    Nutrient,
}

impl ActuatorKind {
    /// Display name used in maintenance log titles.
    pub fn label(&self) -> &'static str {
        match self {
            ActuatorKind::Heater => "Heater",
            ActuatorKind::PhUp => "pH Up",
            ActuatorKind::PhDown => "pH Down",
            ActuatorKind::Nutrient => "Nutrients",
        }
    }

    /// Dosing pumps receive the dispatcher's automatic turn-off; the heater
    /// is governed by the hysteresis law instead.
    pub fn is_pump(&self) -> bool {
        !matches!(self, ActuatorKind::Heater)
    }
}

/// A switch handle shared between tasks. The underlying driver call is
/// serialized through the lock, so concurrent writers degrade to
/// last-writer-wins, which is the intended LED semantics.
#[derive(Clone)]
pub struct SharedSwitch {
    inner: Arc<Mutex<Box<dyn Switch>>>,
}

impl SharedSwitch {
    pub fn new(switch: Box<dyn Switch>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(switch)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Switch>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set(&self, on: bool) {
        self.lock().set(on);
    }

    pub fn is_on(&self) -> bool {
        self.lock().is_on()
    }
}

/// Simulated sensor: base value plus uniform noise, the behavior of the
/// bring-up rig when no bus hardware is attached.
pub struct MockSensor {
    name: &'static str,
    base: f64,
    noise: f64,
}

impl MockSensor {
    pub fn new(name: &'static str, base: f64, noise: f64) -> Self {
        Self { name, base, noise }
    }

    pub fn temperature() -> Self {
        Self::new("Temp", 21.0, 2.5)
    }

    pub fn ph() -> Self {
        Self::new("PH", 6.0, 0.5)
    }

    pub fn ec() -> Self {
        Self::new("EC", 700.0, 150.0)
    }
}

impl Sensor for MockSensor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&mut self) -> f64 {
        self.base + random_range(-self.noise..self.noise)
    }
}

/// Scripted sensor for tests: plays back a fixed sequence, then repeats the
/// last value.
pub struct ScriptedSensor {
    name: &'static str,
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedSensor {
    pub fn new(name: &'static str, values: impl IntoIterator<Item = f64>) -> Self {
        let values: VecDeque<f64> = values.into_iter().collect();
        let last = values.back().copied().unwrap_or(0.0);
        Self { name, values, last }
    }
}

impl Sensor for ScriptedSensor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&mut self) -> f64 {
        match self.values.pop_front() {
            Some(value) => {
                self.last = value;
                value
            }
            None => self.last,
        }
    }
}

/// Simulated actuator: logs each transition, tracks state in memory.
pub struct MockSwitch {
    name: &'static str,
    on: bool,
    transitions: u32,
}

impl MockSwitch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            on: false,
            transitions: 0,
        }
    }

    /// Number of observed state transitions (idempotent sets excluded).
    pub fn transitions(&self) -> u32 {
        self.transitions
    }
}

impl Switch for MockSwitch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        self.on = on;
        self.transitions += 1;
        info!("[{}] {}", self.name, if on { "ON" } else { "OFF" });
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// No-op actuator used when a hardware probe fails. Keeps state so the
/// control law stays coherent, touches nothing.
pub struct NullSwitch {
    name: &'static str,
    on: bool,
}

impl NullSwitch {
    pub fn new(name: &'static str) -> Self {
        Self { name, on: false }
    }
}

impl Switch for NullSwitch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_sets_produce_no_transitions() {
        let mut switch = MockSwitch::new("Heater");
        switch.set(false);
        switch.set(false);
        assert_eq!(switch.transitions(), 0);

        switch.set(true);
        switch.set(true);
        switch.set(false);
        assert_eq!(switch.transitions(), 2);
    }

    #[test]
    fn scripted_sensor_repeats_last_value() {
        let mut sensor = ScriptedSensor::new("Temp", [23.0, 24.1]);
        assert_eq!(sensor.read(), 23.0);
        assert_eq!(sensor.read(), 24.1);
        assert_eq!(sensor.read(), 24.1);
    }

    #[test]
    fn shared_switch_is_last_writer_wins() {
        let led = SharedSwitch::new(Box::new(MockSwitch::new("AlertLed")));
        let led2 = led.clone();
        led.set(true);
        led2.set(false);
        assert!(!led.is_on());
    }
}

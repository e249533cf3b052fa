//! Control orchestrator: owns the sensors, actuators, classifier, range
//! store, and the producing end of the message channel; spawns and joins
//! the worker tasks (tick generator, dispatcher, sensor-read,
//! camera+inference, four actuator excitations).

mod actuators;
mod camera_task;
mod dispatch;
pub mod ranges;
mod sensors_task;

pub use actuators::ActuatorCell;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::BusSender;
use crate::camera::CameraDevice;
use crate::config::EngineConfig;
use crate::hal::{ActuatorKind, Sensor, SharedSwitch, Switch};
use crate::ml::Classifier;
use ranges::IdealRanges;

/// One environmental snapshot as read by the sensor task.
#[derive(Debug, Clone, Copy)]
pub struct SensorSample {
    pub temperature: f64,
    pub ph: f64,
    pub ec: f64,
    pub timestamp: DateTime<Utc>,
}

/// The hardware handed to the orchestrator. Constructors may have probed
/// the buses already; none of these spawn tasks.
pub struct Devices {
    pub temp: Box<dyn Sensor>,
    pub ph: Box<dyn Sensor>,
    pub ec: Box<dyn Sensor>,
    pub heater: Box<dyn Switch>,
    pub ph_up: Box<dyn Switch>,
    pub ph_down: Box<dyn Switch>,
    pub nutrient: Box<dyn Switch>,
    pub alert_led: Box<dyn Switch>,
    pub camera: Box<dyn CameraDevice>,
}

/// State shared by the worker tasks.
pub(crate) struct Shared {
    pub tick_period: Duration,
    pub sensor_period: u32,
    pub camera_period: u32,
    pub auto_off_heater: bool,

    pub ranges: IdealRanges,
    pub bus: BusSender,
    pub cancel: CancellationToken,

    /// True while the last sensor pass found any parameter out of range;
    /// the dispatcher decays the sensor cooldown twice as fast then.
    pub sensors_correcting: AtomicBool,

    pub dispatcher_wake: Notify,
    pub sensor_wake: Notify,
    pub camera_wake: Notify,

    pub heater: Arc<ActuatorCell>,
    pub ph_up: Arc<ActuatorCell>,
    pub ph_down: Arc<ActuatorCell>,
    pub nutrient: Arc<ActuatorCell>,
    pub led: SharedSwitch,

    /// Latest sample, consumed by the camera task when synthesizing
    /// recommendations.
    pub latest_sample: Mutex<Option<SensorSample>>,
}

impl Shared {
    pub fn cells(&self) -> [&Arc<ActuatorCell>; 4] {
        [&self.heater, &self.ph_up, &self.ph_down, &self.nutrient]
    }
}

/// Parts that move into their worker tasks at `start()`.
struct Parts {
    temp: Box<dyn Sensor>,
    ph: Box<dyn Sensor>,
    ec: Box<dyn Sensor>,
    camera: Box<dyn CameraDevice>,
    classifier: Arc<Classifier>,
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    parts: Option<Parts>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        devices: Devices,
        classifier: Classifier,
        bus: BusSender,
    ) -> Self {
        let shared = Arc::new(Shared {
            tick_period: config.tick_period(),
            sensor_period: config.sensor_period_ticks,
            camera_period: config.camera_period_ticks,
            auto_off_heater: config.auto_off_heater,
            ranges: IdealRanges::new(),
            bus,
            cancel: CancellationToken::new(),
            sensors_correcting: AtomicBool::new(false),
            dispatcher_wake: Notify::new(),
            sensor_wake: Notify::new(),
            camera_wake: Notify::new(),
            heater: ActuatorCell::new(ActuatorKind::Heater, devices.heater),
            ph_up: ActuatorCell::new(ActuatorKind::PhUp, devices.ph_up),
            ph_down: ActuatorCell::new(ActuatorKind::PhDown, devices.ph_down),
            nutrient: ActuatorCell::new(ActuatorKind::Nutrient, devices.nutrient),
            led: SharedSwitch::new(devices.alert_led),
            latest_sample: Mutex::new(None),
        });

        Self {
            shared,
            parts: Some(Parts {
                temp: devices.temp,
                ph: devices.ph,
                ec: devices.ec,
                camera: devices.camera,
                classifier: Arc::new(classifier),
            }),
            handles: Vec::new(),
        }
    }

    /// The ideal-range store (exposed to the settings surface).
    pub fn ranges(&self) -> &IdealRanges {
        &self.shared.ranges
    }

    /// Shared handle on one actuator's switch.
    pub fn actuator(&self, kind: ActuatorKind) -> SharedSwitch {
        match kind {
            ActuatorKind::Heater => self.shared.heater.switch(),
            ActuatorKind::PhUp => self.shared.ph_up.switch(),
            ActuatorKind::PhDown => self.shared.ph_down.switch(),
            ActuatorKind::Nutrient => self.shared.nutrient.switch(),
        }
    }

    /// Shared handle on the alert LED.
    pub fn alert_led(&self) -> SharedSwitch {
        self.shared.led.clone()
    }

    /// Spawns every worker. Must be called from a tokio runtime. Fails if
    /// the engine was already started.
    pub fn start(&mut self) -> Result<()> {
        let Some(parts) = self.parts.take() else {
            bail!("engine already started");
        };

        let shared = &self.shared;

        // Excitation tasks first so no early signal is lost.
        for cell in shared.cells() {
            let cell = Arc::clone(cell);
            let bus = shared.bus.clone();
            let cancel = shared.cancel.clone();
            let name = cell.kind().label();
            let handle = tokio::spawn(cell.run(bus, cancel));
            self.handles.push((name, handle));
        }

        let camera_handle = tokio::spawn(camera_task::run(
            Arc::clone(shared),
            parts.camera,
            parts.classifier,
        ));
        let sensor_handle = tokio::spawn(sensors_task::run(
            Arc::clone(shared),
            parts.temp,
            parts.ph,
            parts.ec,
        ));
        let dispatcher_handle = tokio::spawn(dispatch::run_dispatcher(Arc::clone(shared)));
        let tick_handle = tokio::spawn(dispatch::run_tick(Arc::clone(shared)));

        // Join order follows dependency direction: tick first, then the
        // dispatcher it feeds, then the tasks the dispatcher signals.
        let mut ordered = vec![
            ("tick", tick_handle),
            ("dispatcher", dispatcher_handle),
            ("sensors", sensor_handle),
            ("camera", camera_handle),
        ];
        ordered.append(&mut self.handles);
        self.handles = ordered;

        Ok(())
    }

    /// Signals shutdown and joins every worker. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.shared.cancel.cancel();
        for (name, handle) in self.handles.drain(..) {
            if let Err(err) = handle.await {
                error!("worker {name} did not shut down cleanly: {err}");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Best effort: tasks observe the token and exit; a graceful join
        // needs the async `stop()`.
        self.shared.cancel.cancel();
    }
}

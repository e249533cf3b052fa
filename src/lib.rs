pub mod bus;
pub mod camera;
pub mod config;
pub mod control;
pub mod daemon;
pub mod db;
pub mod hal;
pub mod ml;
pub mod wire;

pub use bus::{BusReceiver, BusSender};
pub use config::EngineConfig;
pub use control::{Devices, Orchestrator, SensorSample};
pub use daemon::PersistenceDaemon;
pub use db::Store;
pub use ml::{Analysis, Classifier, OodThresholds};
pub use wire::WireMessage;

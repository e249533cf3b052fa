use std::path::PathBuf;

use anyhow::Result;
use log::{info, warn};

use leafsense::camera::GalleryCamera;
use leafsense::control::Devices;
use leafsense::hal::{
    AlertLed, Ds18b20, EcProbe, GpioSwitch, IioAdc, MockAdc, MockSensor, NullSwitch, PhProbe,
    Sensor, SharedVoltageSource, Switch, VoltageSource, DEFAULT_LED_DEVICE,
};
use leafsense::{bus, Classifier, EngineConfig, Orchestrator, PersistenceDaemon};

// Actuator GPIO assignments on the cultivation unit.
const HEATER_PIN: u32 = 26;
const PH_UP_PIN: u32 = 6;
const PH_DOWN_PIN: u32 = 13;
const NUTRIENT_PIN: u32 = 5;

// ADS1115 channel assignments.
const PH_ADC_CHANNEL: u8 = 0;
const EC_ADC_CHANNEL: u8 = 1;

const IIO_ADC_DIR: &str = "/sys/bus/iio/devices/iio:device0";
const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("LeafSense engine starting up...");

    let config = match config_path() {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };

    let (bus_tx, bus_rx) = bus::channel();

    // The store is opened by the daemon before anything produces; a failure
    // here aborts startup.
    let mut daemon = PersistenceDaemon::spawn(&config.db_path, bus_rx, bus_tx.clone())?;

    let classifier = Classifier::new(
        &config.model_dir,
        &config.model_name,
        config.image_size,
        config.ood_thresholds(),
    );

    let mut engine = Orchestrator::new(&config, build_devices(&config), classifier, bus_tx);
    engine.start()?;

    info!("Engine running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Workers first, then the daemon: the EXIT sentinel must land behind
    // every message the workers produced.
    engine.stop().await;
    daemon.stop();

    info!("Shutdown complete");
    Ok(())
}

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("LEAFSENSE_CONFIG").map(PathBuf::from))
}

/// Probes the unit's buses and assembles the device set, downgrading each
/// absent piece of hardware to its simulated or no-op stand-in.
fn build_devices(config: &EngineConfig) -> Devices {
    let temp: Box<dyn Sensor> = match detect_ds18b20() {
        Some(sensor) => {
            info!("[HAL] DS18B20 temperature probe detected");
            Box::new(sensor)
        }
        None => {
            warn!("[HAL] no DS18B20 on the 1-Wire bus; using simulated temperature");
            Box::new(MockSensor::temperature())
        }
    };

    let iio = IioAdc::new(IIO_ADC_DIR);
    let adc: Box<dyn VoltageSource> = if iio.is_present() {
        info!("[HAL] ADS1115 detected at {IIO_ADC_DIR}");
        Box::new(iio)
    } else {
        warn!("[HAL] no ADC at {IIO_ADC_DIR}; using simulated probe voltages");
        Box::new(MockAdc::default())
    };
    let adc = SharedVoltageSource::new(adc);

    let ph: Box<dyn Sensor> = Box::new(PhProbe::new(
        adc.clone(),
        PH_ADC_CHANNEL,
        Default::default(),
    ));
    let ec: Box<dyn Sensor> = Box::new(EcProbe::new(adc, EC_ADC_CHANNEL, Default::default()));

    Devices {
        temp,
        ph,
        ec,
        heater: gpio_or_null("Heater", HEATER_PIN),
        ph_up: gpio_or_null("pH Up", PH_UP_PIN),
        ph_down: gpio_or_null("pH Down", PH_DOWN_PIN),
        nutrient: gpio_or_null("Nutrients", NUTRIENT_PIN),
        alert_led: Box::new(AlertLed::new(DEFAULT_LED_DEVICE)),
        camera: Box::new(GalleryCamera::new(&config.gallery_dir, true)),
    }
}

fn detect_ds18b20() -> Option<Ds18b20> {
    let entries = std::fs::read_dir(W1_DEVICES_DIR).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("28-") {
            let sensor = Ds18b20::new(&name);
            if sensor.is_present() {
                return Some(sensor);
            }
        }
    }
    None
}

fn gpio_or_null(name: &'static str, pin: u32) -> Box<dyn Switch> {
    match GpioSwitch::probe(name, pin) {
        Ok(switch) => Box::new(switch),
        Err(err) => {
            warn!("[HAL] {name} GPIO {pin} unavailable ({err:#}); actuation disabled");
            Box::new(NullSwitch::new(name))
        }
    }
}

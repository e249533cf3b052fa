//! Sensor-read task and the hysteretic control law.
//!
//! On every activation: read T, pH, EC in that order, publish the sample,
//! then decide actuation against a snapshot of the ideal ranges. The
//! temperature law is hysteretic with strict inequalities: a below-minimum
//! crossing is the only trigger to turn the heater on, an above-maximum
//! crossing only fires while it is on, and nothing happens inside the
//! deadband or exactly on a boundary.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::hal::Sensor;
use crate::wire::WireMessage;

use super::{SensorSample, Shared};

pub(crate) async fn run(
    shared: Arc<Shared>,
    mut temp: Box<dyn Sensor>,
    mut ph: Box<dyn Sensor>,
    mut ec: Box<dyn Sensor>,
) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.sensor_wake.notified() => {}
        }

        let t = temp.read();
        let p = ph.read();
        let e = ec.read();
        debug!("sensor pass: T={t:.2} pH={p:.2} EC={e:.1}");

        shared.bus.send(&WireMessage::Sensor {
            temperature: t,
            ph: p,
            ec: e,
        });

        let sample = SensorSample {
            temperature: t,
            ph: p,
            ec: e,
            timestamp: Utc::now(),
        };
        *shared.latest_sample.lock().unwrap() = Some(sample);

        let ranges = shared.ranges.snapshot();

        // Fixed actuation order: heater, pH, EC.
        let heater_on = shared.heater.is_on();
        if t < ranges.temp.min && !heater_on {
            shared.heater.request_toggle("Water below temperature minimum");
        } else if t > ranges.temp.max && heater_on {
            shared.heater.request_toggle("Water above temperature maximum");
        }

        if p < ranges.ph.min {
            shared.ph_up.request_toggle("pH below minimum");
        } else if p > ranges.ph.max {
            shared.ph_down.request_toggle("pH above maximum");
        }

        // No upper-side EC correction: dilution needs a water change.
        if e < ranges.ec.min {
            shared.nutrient.request_toggle("EC below minimum");
        }

        // Alert policy reflects the just-logged sample, and the correcting
        // flag speeds up the next cooldown decay while anything is off.
        let out_of_range = !ranges.temp.contains(t)
            || !ranges.ph.contains(p)
            || !ranges.ec.contains(e);
        shared
            .sensors_correcting
            .store(out_of_range, Ordering::Release);
        shared.led.set(out_of_range);
    }
}

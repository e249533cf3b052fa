//! Tick generator and dispatcher.
//!
//! The tick generator is the only timed wait in the engine; everything else
//! reacts to signals. The dispatcher owns the per-task cooldowns and is
//! their sole decrementer, so cooldown arithmetic is race-free by
//! construction.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;
use tokio::time::MissedTickBehavior;

use super::Shared;

/// Heartbeat: sleeps one tick period, wakes the dispatcher, repeats.
pub(crate) async fn run_tick(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // first dispatch happens one full period after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => shared.dispatcher_wake.notify_one(),
        }
    }
    debug!("tick generator stopped");
}

/// Converts ticks into sub-task activations.
pub(crate) async fn run_dispatcher(shared: Arc<Shared>) {
    // Both cooldowns start at 1 so the first tick activates both tasks,
    // then the configured periods take over.
    let mut sensor_cooldown: i32 = 1;
    let mut camera_cooldown: i32 = 1;

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.dispatcher_wake.notified() => {}
        }

        // 1. Uniform pulse width for dosing: every pump still running gets
        //    a turn-off signal one tick after its excitation. The heater is
        //    governed by the hysteresis law instead, unless the policy flag
        //    opts it back in.
        for cell in shared.cells() {
            if !cell.is_on() {
                continue;
            }
            if cell.kind().is_pump() || shared.auto_off_heater {
                cell.request_toggle("Auto cycle off");
            }
        }

        // 2. Sensor cooldown decays twice as fast while a correction is in
        //    flight, accelerating recovery without tightening the tick.
        let step = if shared.sensors_correcting.load(Ordering::Acquire) {
            2
        } else {
            1
        };
        sensor_cooldown -= step;
        if sensor_cooldown <= 0 {
            sensor_cooldown = shared.sensor_period as i32;
            shared.sensor_wake.notify_one();
        }

        // 3. Camera cooldown.
        camera_cooldown -= 1;
        if camera_cooldown <= 0 {
            camera_cooldown = shared.camera_period as i32;
            shared.camera_wake.notify_one();
        }
    }
    debug!("dispatcher stopped");
}

//! Actuator cells and their excitation tasks.
//!
//! Each actuator gets one cell: the switch itself (shared so the controller
//! can read state), plus a private signal channel its excitation task waits
//! on. A signal means "toggle": the task flips the switch and logs the edge
//! with the reason carried by the signal. Dosing pulses come out one tick
//! wide because the dispatcher signals a turn-off for every running pump on
//! the next tick.

use std::sync::{Arc, Mutex};

use log::warn;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::bus::BusSender;
use crate::db::models::LogCategory;
use crate::hal::{ActuatorKind, SharedSwitch, Switch};
use crate::wire::WireMessage;

pub struct ActuatorCell {
    kind: ActuatorKind,
    switch: SharedSwitch,
    signal_tx: UnboundedSender<String>,
    signal_rx: Mutex<Option<UnboundedReceiver<String>>>,
}

impl ActuatorCell {
    pub fn new(kind: ActuatorKind, switch: Box<dyn Switch>) -> Arc<Self> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            kind,
            switch: SharedSwitch::new(switch),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
        })
    }

    pub fn kind(&self) -> ActuatorKind {
        self.kind
    }

    /// Last commanded switch state. Reading this while the excitation task
    /// is mid-toggle is a benign race: a stale read causes at most one
    /// extra signal, which the task collapses into a toggle.
    pub fn is_on(&self) -> bool {
        self.switch.is_on()
    }

    /// Shared handle on the underlying switch (tests observe state here).
    pub fn switch(&self) -> SharedSwitch {
        self.switch.clone()
    }

    /// Signals the excitation task to toggle, with a reason for the edge
    /// log. Never blocks.
    pub fn request_toggle(&self, reason: &str) {
        if self.signal_tx.send(reason.to_string()).is_err() {
            warn!("[{}] excitation task is gone", self.kind.label());
        }
    }

    /// Excitation task body: wait on the private signal, toggle, log the
    /// edge. Exits on cancellation.
    pub async fn run(self: Arc<Self>, bus: BusSender, cancel: CancellationToken) {
        let Some(mut signal_rx) = self.signal_rx.lock().unwrap().take() else {
            warn!("[{}] excitation task started twice", self.kind.label());
            return;
        };

        loop {
            let reason = tokio::select! {
                _ = cancel.cancelled() => break,
                received = signal_rx.recv() => match received {
                    Some(reason) => reason,
                    None => break,
                },
            };

            let now_on = !self.switch.is_on();
            self.switch.set(now_on);

            bus.send(&WireMessage::Log {
                category: LogCategory::Maintenance,
                title: format!(
                    "{} {}",
                    self.kind.label(),
                    if now_on { "On" } else { "Off" }
                ),
                detail: reason,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus;
    use crate::hal::MockSwitch;

    #[tokio::test]
    async fn toggle_signals_produce_edges_in_order() {
        let (bus_tx, bus_rx) = bus::channel();
        let cancel = CancellationToken::new();
        let cell = ActuatorCell::new(ActuatorKind::PhUp, Box::new(MockSwitch::new("pH Up")));

        let task = tokio::spawn(cell.clone().run(bus_tx, cancel.clone()));

        cell.request_toggle("pH below minimum");
        cell.request_toggle("Auto cycle off");

        // Wait for both edges to land on the bus.
        let first = tokio::task::spawn_blocking(move || {
            let a = bus_rx.receive().unwrap();
            let b = bus_rx.receive().unwrap();
            (a, b)
        })
        .await
        .unwrap();

        assert_eq!(first.0, "LOG|Maintenance|pH Up On|pH below minimum");
        assert_eq!(first.1, "LOG|Maintenance|pH Up Off|Auto cycle off");
        assert!(!cell.is_on());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_task() {
        let (bus_tx, _bus_rx) = bus::channel();
        let cancel = CancellationToken::new();
        let cell = ActuatorCell::new(ActuatorKind::Heater, Box::new(MockSwitch::new("Heater")));

        let task = tokio::spawn(cell.clone().run(bus_tx, cancel.clone()));
        cancel.cancel();
        task.await.unwrap();
    }
}

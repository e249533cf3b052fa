//! In-process message channel between the control tasks and the persistence
//! daemon: multi-producer, single-consumer, unbounded FIFO of wire lines.
//!
//! `send` never blocks; `receive` blocks the daemon thread until a message
//! arrives. The `EXIT` sentinel asks the consumer to shut down; producers
//! must enqueue it only after all intended messages.

use std::sync::mpsc::{self, Receiver, Sender};

use log::warn;

use crate::wire::WireMessage;

/// Consumer shutdown sentinel.
pub const EXIT_SENTINEL: &str = "EXIT";

/// Creates a connected sender/receiver pair.
pub fn channel() -> (BusSender, BusReceiver) {
    let (tx, rx) = mpsc::channel();
    (BusSender { tx }, BusReceiver { rx })
}

/// Cloneable producer handle. Messages from one producer are observed in
/// send order; no cross-producer ordering is guaranteed.
#[derive(Clone)]
pub struct BusSender {
    tx: Sender<String>,
}

impl BusSender {
    /// Encodes and enqueues a message. Unencodable messages (delimiter in a
    /// field) and a vanished consumer are logged and dropped; producers
    /// never fail on a bad log line.
    pub fn send(&self, msg: &WireMessage) {
        match msg.encode() {
            Ok(line) => self.send_raw(line),
            Err(err) => warn!("dropping unencodable message: {err:#}"),
        }
    }

    /// Enqueues a raw wire line.
    pub fn send_raw(&self, line: String) {
        if self.tx.send(line).is_err() {
            warn!("persistence daemon is gone; message dropped");
        }
    }

    /// Enqueues the shutdown sentinel.
    pub fn send_exit(&self) {
        self.send_raw(EXIT_SENTINEL.to_string());
    }
}

/// Single consumer handle, owned by the persistence daemon.
pub struct BusReceiver {
    rx: Receiver<String>,
}

impl BusReceiver {
    /// Blocks until a message is available. Returns `None` once every sender
    /// has been dropped and the queue is drained.
    pub fn receive(&self) -> Option<String> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LogCategory;

    #[test]
    fn per_producer_fifo_order() {
        let (tx, rx) = channel();
        for i in 0..10 {
            tx.send_raw(format!("LOG|Maintenance|msg {i}|"));
        }
        for i in 0..10 {
            assert_eq!(rx.receive().unwrap(), format!("LOG|Maintenance|msg {i}|"));
        }
    }

    #[test]
    fn send_survives_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        // Must not panic or block.
        tx.send(&WireMessage::Log {
            category: LogCategory::Maintenance,
            title: "t".into(),
            detail: "d".into(),
        });
        tx.send_exit();
    }

    #[test]
    fn receive_returns_none_after_senders_drop() {
        let (tx, rx) = channel();
        tx.send_raw("SENSOR|1|2|3".into());
        drop(tx);
        assert_eq!(rx.receive().unwrap(), "SENSOR|1|2|3");
        assert!(rx.receive().is_none());
    }
}

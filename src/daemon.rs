//! Persistence daemon: a dedicated worker thread that drains the message
//! channel, translates each wire line into a parameterized store write, and
//! keeps running across per-message failures. The `EXIT` sentinel is the
//! only way out of the loop, so every message enqueued before it is
//! persisted.

use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info};

use crate::bus::{BusReceiver, BusSender, EXIT_SENTINEL};
use crate::db::Store;
use crate::wire::WireMessage;

pub struct PersistenceDaemon {
    sender: BusSender,
    worker: Option<JoinHandle<()>>,
}

impl PersistenceDaemon {
    /// Opens the store on a dedicated thread and starts draining `receiver`.
    ///
    /// Store-open failure is reported here, before any producer runs; the
    /// engine must refuse to start without a working store.
    pub fn spawn(db_path: &Path, receiver: BusReceiver, sender: BusSender) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.to_path_buf();

        let worker = thread::Builder::new()
            .name("leafsense-db".into())
            .spawn(move || {
                let store = match Store::open(&path_for_thread) {
                    Ok(store) => store,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if ready_tx.send(Ok(())).is_err() {
                    error!("daemon spawn caller dropped before ready signal");
                    return;
                }

                run_loop(&store, &receiver);
            })
            .context("failed to spawn persistence daemon thread")?;

        ready_rx
            .recv()
            .context("persistence daemon exited before signaling readiness")??;

        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }

    /// Enqueues `EXIT` and joins the worker. Safe to call more than once.
    /// Producers must have finished sending before this is called, so the
    /// sentinel goes in behind their last message.
    pub fn stop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.sender.send_exit();
            if let Err(join_err) = handle.join() {
                error!("Failed to join persistence daemon thread: {join_err:?}");
            }
        }
    }
}

impl Drop for PersistenceDaemon {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(store: &Store, receiver: &BusReceiver) {
    info!("Persistence daemon started");

    while let Some(raw) = receiver.receive() {
        if raw == EXIT_SENTINEL {
            break;
        }

        let message = match WireMessage::parse(&raw) {
            Ok(message) => message,
            Err(err) => {
                error!("Dropping malformed message {raw:?}: {err:#}");
                continue;
            }
        };

        match apply(store, &message) {
            Ok(applied) => {
                if applied {
                    debug!("Persisted: {raw}");
                } else {
                    debug!("No matching parent row, dropped: {raw}");
                }
            }
            Err(err) => error!("Failed to persist {raw:?}: {err:#}"),
        }
    }

    info!("Persistence daemon stopped");
}

/// Executes one message against the store. Returns `false` when a join
/// found no parent row (the append is silently rejected).
fn apply(store: &Store, message: &WireMessage) -> Result<bool> {
    let now = Utc::now();
    match message {
        WireMessage::Sensor {
            temperature,
            ph,
            ec,
        } => {
            store.insert_sensor_reading(*temperature, *ph, *ec, now)?;
            Ok(true)
        }
        WireMessage::Log {
            category,
            title,
            detail,
        } => {
            store.insert_log(*category, title, detail, now)?;
            Ok(true)
        }
        WireMessage::Alert {
            kind,
            message,
            detail,
        } => {
            store.insert_alert(*kind, message, detail.as_deref(), now)?;
            Ok(true)
        }
        WireMessage::Image { filename, path } => {
            store.insert_image(filename, path, now)?;
            Ok(true)
        }
        WireMessage::Prediction {
            filename,
            label,
            confidence,
        } => store.insert_prediction(filename, label, *confidence, now),
        WireMessage::Recommendation {
            filename,
            kind,
            text,
            confidence,
        } => store.insert_recommendation(filename, *kind, text, *confidence, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus;

    fn temp_db(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("leafsense_daemon_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn drains_everything_before_exit() {
        let path = temp_db("drain.db");
        let (tx, rx) = bus::channel();

        let mut daemon = PersistenceDaemon::spawn(&path, rx, tx.clone()).unwrap();
        for i in 0..100 {
            tx.send_raw(format!("SENSOR|{}|6.0|700", 20.0 + i as f64 * 0.01));
        }
        daemon.stop();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.sensor_reading_count().unwrap(), 100);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_messages_do_not_stop_the_loop() {
        let path = temp_db("malformed.db");
        let (tx, rx) = bus::channel();

        let mut daemon = PersistenceDaemon::spawn(&path, rx, tx.clone()).unwrap();
        tx.send_raw("GARBAGE|x|y".into());
        tx.send_raw("SENSOR|21|not_a_number|700".into());
        tx.send_raw("SENSOR|21|6.1|700".into());
        daemon.stop();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.sensor_reading_count().unwrap(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn stop_is_idempotent() {
        let path = temp_db("idempotent.db");
        let (tx, rx) = bus::channel();

        let mut daemon = PersistenceDaemon::spawn(&path, rx, tx).unwrap();
        daemon.stop();
        daemon.stop();

        std::fs::remove_file(&path).ok();
    }
}

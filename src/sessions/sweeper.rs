//! Periodic idle-session eviction.
//!
//! # Responsibilities
//! - Run `SessionRegistry::sweep` on a fixed interval
//! - Stop cleanly on demand (shutdown, tests)
//!
//! # Design Decisions
//! - Runs as a tokio task, so it never keeps the process alive by itself
//! - `stop` is idempotent and also runs on drop

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::sessions::registry::SessionRegistry;

/// Handle to a running sweep loop.
#[derive(Debug)]
pub struct SweepTask {
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SweepTask {
    /// Spawn the sweep loop. The first sweep runs one `interval` after start.
    pub fn start(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tracing::info!(interval = ?interval, "Session sweeper starting");
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.sweep();
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Session sweeper stopped");
        });

        Self {
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("sweeper mutex poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop to exit. Safe to call more than once.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().expect("sweeper mutex poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Session sweeper task failed");
            }
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        self.stop();
    }
}

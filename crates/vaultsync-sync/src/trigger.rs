//! Sync scheduler - turns watcher events and timers into rounds
//!
//! Sits between the external filesystem watcher and the [`SyncEngine`].
//! Change events are buffered until the vault has been quiet for the
//! debounce window, then applied to the index and followed by one round.
//! A periodic interval catches remote-only changes when no local events
//! arrive, and [`request_sync`](SyncScheduler::request_sync) bypasses the
//! debounce entirely for "sync now" commands.
//!
//! ## Flow
//!
//! ```text
//! watcher ──→ mpsc::Receiver ──→ SyncScheduler ──→ engine.apply_events()
//!                                     │                    │
//!                               debounce window      engine.sync()
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use vaultsync_core::ports::local_vault::ChangeEvent;

use crate::engine::SyncEngine;

/// Schedules rounds from change events, timers, and manual requests
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    change_rx: mpsc::Receiver<ChangeEvent>,
    manual_rx: mpsc::Receiver<()>,
    /// Quiet period after the last event before a round starts
    debounce: Duration,
    /// Periodic round interval; zero disables the timer
    interval: Duration,
}

/// Cloneable handle for user-initiated "sync now" requests
#[derive(Clone)]
pub struct SyncRequest {
    tx: mpsc::Sender<()>,
}

impl SyncRequest {
    /// Requests an immediate round, bypassing the debounce window
    pub fn request_sync(&self) {
        // A full queue already holds a pending request; dropping is fine.
        let _ = self.tx.try_send(());
    }
}

impl SyncScheduler {
    /// Creates a scheduler driving the given engine
    pub fn new(
        engine: Arc<SyncEngine>,
        change_rx: mpsc::Receiver<ChangeEvent>,
        debounce: Duration,
        interval: Duration,
    ) -> (Self, SyncRequest) {
        let (manual_tx, manual_rx) = mpsc::channel(1);
        info!(
            debounce_ms = debounce.as_millis() as u64,
            interval_secs = interval.as_secs(),
            "Creating sync scheduler"
        );
        (
            Self {
                engine,
                change_rx,
                manual_rx,
                debounce,
                interval,
            },
            SyncRequest { tx: manual_tx },
        )
    }

    /// Main event loop; terminates when the change channel closes
    pub async fn run(&mut self) {
        info!("Sync scheduler starting");

        let mut buffer: Vec<ChangeEvent> = Vec::new();
        let mut deadline: Option<Instant> = None;
        let mut manual_open = true;
        let far_future = || Instant::now() + Duration::from_secs(86_400);
        let mut interval_timer = tokio::time::interval(if self.interval.is_zero() {
            Duration::from_secs(86_400)
        } else {
            self.interval
        });
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; consume it so the periodic
        // round starts one full interval in.
        interval_timer.tick().await;

        loop {
            let quiet_at = deadline.unwrap_or_else(far_future);
            tokio::select! {
                event = self.change_rx.recv() => {
                    match event {
                        Some(event) => {
                            debug!(path = %event.path(), "Buffered change event");
                            buffer.push(event);
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        None => {
                            info!("Change channel closed, scheduler shutting down");
                            if !buffer.is_empty() {
                                self.flush(&mut buffer).await;
                            }
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(quiet_at), if deadline.is_some() => {
                    deadline = None;
                    self.flush(&mut buffer).await;
                }
                request = self.manual_rx.recv(), if manual_open => {
                    match request {
                        Some(()) => {
                            info!("User-initiated sync, bypassing debounce");
                            deadline = None;
                            self.flush(&mut buffer).await;
                        }
                        None => manual_open = false,
                    }
                }
                _ = interval_timer.tick(), if !self.interval.is_zero() => {
                    debug!("Periodic sync interval elapsed");
                    self.run_round().await;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Applies buffered events to the index, then runs one round
    async fn flush(&self, buffer: &mut Vec<ChangeEvent>) {
        let events = std::mem::take(buffer);
        if !events.is_empty() {
            debug!(count = events.len(), "Applying settled change events");
            if let Err(err) = self.engine.apply_events(events).await {
                error!(%err, "Failed to apply change events to the index");
                return;
            }
        }
        self.run_round().await;
    }

    async fn run_round(&self) {
        // Failures are reflected in the status manager; the scheduler
        // only logs and keeps going.
        if let Err(err) = self.engine.sync().await {
            debug!(%err, "Round ended with error");
        }
    }
}

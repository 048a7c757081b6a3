//! Background Scheduler - periodic and change-driven sync cycles.
//!
//! Runs the reconciliation engine on a timer and whenever a local
//! collection changes. Periodic ticks respect the minimum interval;
//! change triggers run after a short debounce that coalesces a burst of
//! local writes into one cycle. Notifications produced by a cycle's own
//! merge writes are drained when the cycle completes, so the engine does
//! not retrigger itself. After a failed cycle the error cooldown
//! suppresses every automatic trigger until it elapses. A trigger
//! arriving while a cycle is in flight is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use tirestock_engine::{CacheStore, Collection};

use crate::config::Config;
use crate::sync::SyncEngine;

/// Tri-state sync status displayed by the UI, plus the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced,
    Error,
}

/// Scheduler timing knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum interval between periodic runs.
    pub sync_interval: Duration,
    /// Cooldown after a failed cycle; suppresses all triggers.
    pub error_cooldown: Duration,
    /// Debounce applied to local change triggers.
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(crate::config::DEFAULT_SYNC_INTERVAL_SECS),
            error_cooldown: Duration::from_secs(crate::config::DEFAULT_ERROR_COOLDOWN_SECS),
            debounce: Duration::from_millis(crate::config::DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            sync_interval: config.sync_interval,
            error_cooldown: config.error_cooldown,
            debounce: config.debounce,
        }
    }
}

/// Handle to the running scheduler task.
pub struct SyncScheduler {
    status_rx: watch::Receiver<SyncStatus>,
    online: Arc<AtomicBool>,
    manual_tx: mpsc::UnboundedSender<()>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    /// Start the scheduler: subscribes to cache change notifications and
    /// spawns the background task.
    pub fn start(engine: Arc<SyncEngine>, cache: &CacheStore, config: SchedulerConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let (change_tx, change_rx) = mpsc::unbounded_channel::<Collection>();
        let (manual_tx, manual_rx) = mpsc::unbounded_channel::<()>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let online = Arc::new(AtomicBool::new(false));

        cache.on_change(Box::new(move |collection| {
            let _ = change_tx.send(collection);
        }));

        let worker = Worker {
            engine,
            config,
            status_tx,
            online: online.clone(),
            change_rx,
            manual_rx,
            shutdown_rx,
            last_attempt: None,
            last_failed: false,
            debounce_deadline: None,
        };
        let task = tokio::spawn(worker.run());

        Self {
            status_rx,
            online,
            manual_tx,
            shutdown_tx,
            task,
        }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// True iff the most recent cycle fully succeeded.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Request an immediate cycle (the UI's manual sync button). Bypasses
    /// the interval gate but not the in-flight guard.
    pub fn trigger(&self) {
        let _ = self.manual_tx.send(());
    }

    /// Stop the background task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

struct Worker {
    engine: Arc<SyncEngine>,
    config: SchedulerConfig,
    status_tx: watch::Sender<SyncStatus>,
    online: Arc<AtomicBool>,
    change_rx: mpsc::UnboundedReceiver<Collection>,
    manual_rx: mpsc::UnboundedReceiver<()>,
    shutdown_rx: watch::Receiver<bool>,
    last_attempt: Option<Instant>,
    last_failed: bool,
    debounce_deadline: Option<Instant>,
}

enum Event {
    Tick,
    Change(Collection),
    DebounceElapsed,
    Manual,
    Shutdown,
}

impl Worker {
    async fn run(mut self) {
        let mut ticker = interval(self.config.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The debounce is a selectable deadline rather than a sleep
            // inside an arm, so manual triggers and shutdown are never
            // stalled behind a pending change burst.
            let deadline = self.debounce_deadline;
            let debounce = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let event = tokio::select! {
                _ = ticker.tick() => Event::Tick,
                Some(collection) = self.change_rx.recv() => Event::Change(collection),
                _ = debounce => Event::DebounceElapsed,
                Some(()) = self.manual_rx.recv() => Event::Manual,
                _ = self.shutdown_rx.changed() => Event::Shutdown,
            };

            match event {
                Event::Tick => {
                    if self.gate_open(true) {
                        self.run_cycle().await;
                    }
                }
                Event::Change(collection) => {
                    tracing::trace!(%collection, "local change trigger");
                    self.debounce_deadline = Some(Instant::now() + self.config.debounce);
                }
                Event::DebounceElapsed => {
                    self.debounce_deadline = None;
                    while self.change_rx.try_recv().is_ok() {}
                    if self.gate_open(false) {
                        self.run_cycle().await;
                    } else {
                        tracing::trace!("change trigger suppressed by cooldown");
                    }
                }
                Event::Manual => {
                    self.run_cycle().await;
                }
                Event::Shutdown => {
                    tracing::debug!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Whether an automatic trigger may run. Periodic ticks wait out the
    /// minimum interval; change triggers only wait out the error cooldown
    /// after a failed cycle, so a degraded backend is not hammered.
    fn gate_open(&self, periodic: bool) -> bool {
        let Some(at) = self.last_attempt else {
            return true;
        };
        if self.last_failed {
            return at.elapsed() >= self.config.error_cooldown;
        }
        if periodic {
            return at.elapsed() >= self.config.sync_interval;
        }
        true
    }

    async fn run_cycle(&mut self) {
        self.last_attempt = Some(Instant::now());
        let _ = self.status_tx.send(SyncStatus::Syncing);

        match self.engine.run_cycle().await {
            Some(report) => {
                // The cycle's own merge writes fired change notifications;
                // absorb them so the engine does not retrigger itself.
                while self.change_rx.try_recv().is_ok() {}
                self.debounce_deadline = None;
                self.last_failed = !report.success;
                self.online.store(report.success, Ordering::SeqCst);
                let status = if report.success {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Error
                };
                let _ = self.status_tx.send(status);
            }
            None => {
                // Dropped by the reentrancy guard (an external caller is
                // mid-cycle). Restore the status the flag implies.
                let status = if self.online.load(Ordering::SeqCst) {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Error
                };
                let _ = self.status_tx.send(status);
            }
        }
    }
}

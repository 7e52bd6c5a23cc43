//! Snapshot persistence: restore on start, periodic dumps, final dump on
//! shutdown.
//!
//! [`Dumper`] owns the store-to-backend path and serializes dumps so an older
//! snapshot can never land after a newer one. [`BackupWorker`] drives it from a
//! single task: a ticker when an interval is configured, then one last dump
//! once the cancellation token fires. The outcome of that last dump is sent on
//! a one-shot channel the process awaits before exit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metricsd_core::error::{MetricsError, Result};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::obs::ServerMetrics;
use crate::store::Store;

/// Why a dump ran. Used as a log field and metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpTrigger {
    Interval,
    Write,
    Shutdown,
}

impl DumpTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            DumpTrigger::Interval => "interval",
            DumpTrigger::Write => "write",
            DumpTrigger::Shutdown => "shutdown",
        }
    }
}

async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| MetricsError::Timeout(limit))?
}

pub struct Dumper {
    store: Arc<Store>,
    backend: Arc<dyn Backend>,
    io_timeout: Duration,
    obs: Arc<ServerMetrics>,
    // Held across snapshot + save.
    gate: Mutex<()>,
}

impl Dumper {
    pub fn new(
        store: Arc<Store>,
        backend: Arc<dyn Backend>,
        io_timeout: Duration,
        obs: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            store,
            backend,
            io_timeout,
            obs,
            gate: Mutex::new(()),
        }
    }

    /// Load the backend's metrics into the store. Returns how many were loaded.
    ///
    /// Malformed records are skipped so everything in the store keeps exactly
    /// one payload matching its kind.
    pub async fn restore(&self) -> Result<usize> {
        let loaded = bounded(self.io_timeout, self.backend.read_all()).await?;
        let mut valid = Vec::with_capacity(loaded.len());
        for m in loaded {
            let id = m.id.clone();
            match m.normalize() {
                Ok(m) => valid.push(m),
                Err(e) => tracing::warn!(id = %id, error = %e, "skipping malformed stored metric"),
            }
        }
        let n = valid.len();
        self.store.bulk_upsert(valid);
        self.obs
            .restored
            .set(&[("backend", self.backend.name())], n as i64);
        Ok(n)
    }

    /// Write a snapshot of the store to the backend. Returns the snapshot size.
    pub async fn dump(&self, trigger: DumpTrigger) -> Result<usize> {
        let _gate = self.gate.lock().await;
        let snapshot = self.store.get_all();
        let res = bounded(self.io_timeout, self.backend.save_all(&snapshot)).await;
        self.obs.record_dump(trigger.as_str(), res.is_ok());
        match &res {
            Ok(()) => tracing::debug!(
                trigger = trigger.as_str(),
                backend = self.backend.name(),
                count = snapshot.len(),
                "metrics dumped"
            ),
            Err(e) => tracing::warn!(
                trigger = trigger.as_str(),
                backend = self.backend.name(),
                error = %e,
                "metrics dump failed"
            ),
        }
        res.map(|()| snapshot.len())
    }
}

/// Completion handle of a spawned [`BackupWorker`].
pub struct Terminated {
    rx: oneshot::Receiver<Result<usize>>,
}

impl Terminated {
    /// Wait for the worker to finish its final dump and return its outcome.
    pub async fn wait(self) -> Result<usize> {
        self.rx
            .await
            .map_err(|_| MetricsError::Internal("backup worker exited without reporting".into()))?
    }
}

pub struct BackupWorker {
    dumper: Arc<Dumper>,
    interval: Duration,
    restore: bool,
}

impl BackupWorker {
    pub fn new(dumper: Arc<Dumper>, interval: Duration, restore: bool) -> Self {
        Self {
            dumper,
            interval,
            restore,
        }
    }

    /// Interval zero means the repository dumps after every write instead.
    pub fn dumps_on_write(&self) -> bool {
        self.interval.is_zero()
    }

    pub fn dumper(&self) -> Arc<Dumper> {
        Arc::clone(&self.dumper)
    }

    /// Restore (when enabled), then spawn the dump task.
    ///
    /// Restore completes before this returns so no request sees a half-seeded
    /// store. A failed restore is logged and the server starts empty.
    pub async fn start(self, cancel: CancellationToken) -> Terminated {
        if self.restore {
            match self.dumper.restore().await {
                Ok(n) => tracing::info!(count = n, "metrics restored"),
                Err(e) => tracing::warn!(error = %e, "restore failed, starting empty"),
            }
        }

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = self.run(cancel).await;
            let _ = tx.send(outcome);
        });
        Terminated { rx }
    }

    async fn run(self, cancel: CancellationToken) -> Result<usize> {
        if self.interval.is_zero() {
            cancel.cancelled().await;
        } else {
            tracing::info!(interval = ?self.interval, "backup timer started");
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Failure already logged by the dumper; keep ticking.
                        let _ = self.dumper.dump(DumpTrigger::Interval).await;
                    }
                }
            }
        }

        tracing::info!("backup timer stopped, writing final snapshot");
        let outcome = self.dumper.dump(DumpTrigger::Shutdown).await;
        if let Ok(n) = &outcome {
            tracing::info!(count = n, "final snapshot written");
        }
        outcome
    }
}

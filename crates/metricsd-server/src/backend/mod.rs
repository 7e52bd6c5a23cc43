//! Persistent backends for metric snapshots.
//!
//! A backend is chosen once at startup: a SQLite database when a DSN is
//! configured, otherwise a JSON snapshot file, otherwise nothing (memory only).
//! Every call may block on I/O; callers bound them with a timeout.

pub mod file;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use metricsd_core::error::Result;
use metricsd_core::Metric;

use crate::config::StorageSection;

pub use file::FileBackend;
pub use sqlite::SqliteBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs and self-metrics.
    fn name(&self) -> &'static str;

    /// Load every stored metric. An empty backend yields an empty vec.
    async fn read_all(&self) -> Result<Vec<Metric>>;

    /// Persist `metrics` so that a later `read_all` returns exactly them.
    async fn save_all(&self, metrics: &[Metric]) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}

/// Open the configured backend. Failure here is fatal to startup.
pub async fn open(storage: &StorageSection) -> Result<Option<Arc<dyn Backend>>> {
    if !storage.persistent() {
        tracing::info!("no persistent backend configured, metrics live in memory only");
        return Ok(None);
    }
    if !storage.database_dsn.is_empty() {
        let db = SqliteBackend::open(&storage.database_dsn).await?;
        tracing::info!(dsn = %storage.database_dsn, "using sqlite backend");
        return Ok(Some(Arc::new(db)));
    }
    let file = FileBackend::open(&storage.store_file).await?;
    tracing::info!(path = %storage.store_file, "using file backend");
    Ok(Some(Arc::new(file)))
}

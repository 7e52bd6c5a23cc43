//! SQLite backend.
//!
//! Uses rusqlite with bundled SQLite and an embedded schema. The connection is
//! wrapped in a `Mutex` and every call runs on the blocking pool.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use metricsd_core::error::{MetricsError, Result};
use metricsd_core::{Metric, MetricKind};
use rusqlite::{params, Connection};

use super::Backend;

const SCHEMA: &str = include_str!("schema.sql");

const UPSERT: &str = "INSERT INTO metrics (type, name, value, delta, hash)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(type, name) DO UPDATE SET
         value = excluded.value,
         delta = excluded.delta,
         hash  = excluded.hash";

pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

fn storage_err(e: rusqlite::Error) -> MetricsError {
    MetricsError::Backend(format!("sqlite: {e}"))
}

impl SqliteBackend {
    /// Open (or create) the database at `dsn`. `:memory:` is accepted.
    pub async fn open(dsn: &str) -> Result<Self> {
        let dsn = dsn.to_string();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&dsn)?;
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|e| MetricsError::Internal(format!("sqlite open task: {e}")))?
        .map_err(storage_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| MetricsError::Internal(format!("sqlite task: {e}")))?
        .map_err(storage_err)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn read_all(&self) -> Result<Vec<Metric>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT type, name, value, delta, hash FROM metrics ORDER BY name, type")?;
            let rows = stmt.query_map([], |row| {
                Ok(Metric {
                    kind: MetricKind::from(row.get::<_, String>(0)?),
                    id: row.get(1)?,
                    value: row.get(2)?,
                    delta: row.get(3)?,
                    hash: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn save_all(&self, metrics: &[Metric]) -> Result<()> {
        let batch = metrics.to_vec();
        let count = batch.len();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            // The snapshot replaces every previously stored row.
            tx.execute("DELETE FROM metrics", [])?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for m in &batch {
                    stmt.execute(params![m.kind.as_str(), m.id, m.value, m.delta, m.hash])?;
                }
            }
            tx.commit()
        })
        .await?;
        tracing::debug!(count, "sqlite snapshot committed");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn empty_database_reads_empty() {
        let db = SqliteBackend::open(":memory:").await.unwrap();
        assert!(db.read_all().await.unwrap().is_empty());
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let db = SqliteBackend::open(":memory:").await.unwrap();

        let mut hashed = Metric::counter("PollCount", 4);
        hashed.hash = Some("abc".into());
        db.save_all(&[Metric::gauge("Alloc", 1.5), Metric::counter("PollCount", 1)])
            .await
            .unwrap();
        db.save_all(&[hashed.clone(), Metric::gauge("PollCount", 0.5)])
            .await
            .unwrap();

        let got = db.read_all().await.unwrap();
        assert_eq!(got, vec![hashed, Metric::gauge("PollCount", 0.5)]);

        db.save_all(&[]).await.unwrap();
        assert!(db.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopened_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = dir.path().join("metrics.db");
        let dsn = dsn.to_str().unwrap();

        let db = SqliteBackend::open(dsn).await.unwrap();
        db.save_all(&[Metric::counter("c", 9)]).await.unwrap();
        drop(db);

        let db = SqliteBackend::open(dsn).await.unwrap();
        assert_eq!(db.read_all().await.unwrap(), vec![Metric::counter("c", 9)]);
    }
}

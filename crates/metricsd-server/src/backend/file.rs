//! JSON snapshot file backend.
//!
//! The file holds one JSON array of metrics. Saves write a sibling `.tmp` file
//! and rename it over the snapshot, so a crash mid-write leaves the previous
//! snapshot intact.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metricsd_core::error::{MetricsError, Result};
use metricsd_core::Metric;
use tokio::sync::Mutex;

use super::Backend;

pub struct FileBackend {
    path: PathBuf,
    // Serializes file access within the process.
    io: Mutex<()>,
}

impl FileBackend {
    /// Open (creating if needed) the snapshot file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| io_error("open", &path, e))?;
        Ok(Self {
            path,
            io: Mutex::new(()),
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

fn io_error(op: &str, path: &Path, e: std::io::Error) -> MetricsError {
    MetricsError::Backend(format!("{op} `{}`: {e}", path.display()))
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn read_all(&self) -> Result<Vec<Metric>> {
        let _io = self.io.lock().await;
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| io_error("read", &self.path, e))?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|e| {
            MetricsError::Backend(format!(
                "corrupt snapshot `{}`: {e}",
                self.path.display()
            ))
        })
    }

    async fn save_all(&self, metrics: &[Metric]) -> Result<()> {
        let mut body = serde_json::to_vec(metrics)
            .map_err(|e| MetricsError::Internal(format!("encode snapshot: {e}")))?;
        body.push(b'\n');

        let _io = self.io.lock().await;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))?;
        tracing::debug!(path = %self.path.display(), count = metrics.len(), "snapshot written");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| io_error("stat", &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn fresh_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("metrics.json")).await.unwrap();
        assert!(backend.read_all().await.unwrap().is_empty());
        backend.ping().await.unwrap();
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("metrics.json")).await.unwrap();

        backend
            .save_all(&[Metric::gauge("a", 1.0), Metric::counter("b", 2)])
            .await
            .unwrap();
        backend.save_all(&[Metric::counter("b", 3)]).await.unwrap();

        assert_eq!(backend.read_all().await.unwrap(), vec![Metric::counter("b", 3)]);
        assert!(!backend.tmp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_descriptive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "[{\"id\":").unwrap();

        let backend = FileBackend::open(&path).await.unwrap();
        let err = backend.read_all().await.unwrap_err();
        assert!(matches!(err, MetricsError::Backend(ref m) if m.contains("corrupt snapshot")));
    }

    #[tokio::test]
    async fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let res = FileBackend::open(dir.path().join("nope").join("metrics.json")).await;
        assert!(matches!(res, Err(MetricsError::Backend(_))));
    }
}

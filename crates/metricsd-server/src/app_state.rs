//! Shared application state and startup wiring.

use std::sync::Arc;

use metricsd_core::error::Result;

use crate::backend;
use crate::backup::{BackupWorker, Dumper};
use crate::config::ServerConfig;
use crate::obs::ServerMetrics;
use crate::repository::Repository;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    repo: Repository,
}

impl AppState {
    pub fn new(cfg: ServerConfig, repo: Repository) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cfg, repo }),
        }
    }

    /// Open the backend and wire store, repository and backup worker.
    ///
    /// Fails when the configured file or database cannot be opened. The
    /// returned worker (present whenever a backend is) must be started before
    /// serving so restore completes first.
    pub async fn build(cfg: ServerConfig) -> Result<(Self, Option<BackupWorker>)> {
        let obs = Arc::new(ServerMetrics::default());
        let store = Arc::new(Store::new());
        let mut repo = Repository::new(Arc::clone(&store), &cfg.integrity.key)
            .with_metrics(Arc::clone(&obs));

        let worker = match backend::open(&cfg.storage).await? {
            Some(backend) => {
                let dumper = Arc::new(Dumper::new(
                    Arc::clone(&store),
                    Arc::clone(&backend),
                    cfg.storage.io_timeout,
                    obs,
                ));
                let worker = BackupWorker::new(
                    dumper,
                    cfg.storage.store_interval,
                    cfg.storage.restore,
                );
                repo = repo.with_backend(backend);
                if worker.dumps_on_write() {
                    repo = repo.with_sync_dump(worker.dumper());
                }
                Some(worker)
            }
            None => None,
        };

        if cfg.integrity.key.is_empty() {
            tracing::info!("integrity hashing disabled");
        }
        Ok((Self::new(cfg, repo), worker))
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn repo(&self) -> &Repository {
        &self.inner.repo
    }
}

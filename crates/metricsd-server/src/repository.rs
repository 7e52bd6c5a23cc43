//! Business rules on top of the store.
//!
//! Update pipeline per metric:
//! 1. reject unknown kinds and missing payloads, dropping the payload field
//!    that does not belong to the kind;
//! 2. verify the client's hash when both a hash and a key are present;
//! 3. merge with the stored entry (counters add, gauges overwrite), re-stamp
//!    the hash and write, all under the store lock.
//!
//! Validation failures never touch the store.

use std::sync::Arc;
use std::time::Duration;

use metricsd_core::error::{MetricsError, Result};
use metricsd_core::{integrity, Metric, MetricKind};

use crate::backend::Backend;
use crate::backup::{DumpTrigger, Dumper};
use crate::obs::ServerMetrics;
use crate::store::Store;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Repository {
    store: Arc<Store>,
    key: Option<Vec<u8>>,
    backend: Option<Arc<dyn Backend>>,
    sync_dump: Option<Arc<Dumper>>,
    obs: Arc<ServerMetrics>,
}

impl Repository {
    /// An empty `key` disables hashing.
    pub fn new(store: Arc<Store>, key: &str) -> Self {
        Self {
            store,
            key: (!key.is_empty()).then(|| key.as_bytes().to_vec()),
            backend: None,
            sync_dump: None,
            obs: Arc::new(ServerMetrics::default()),
        }
    }

    /// Backend probed by [`Repository::ping`].
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Dump after every successful write.
    pub fn with_sync_dump(mut self, dumper: Arc<Dumper>) -> Self {
        self.sync_dump = Some(dumper);
        self
    }

    pub fn with_metrics(mut self, obs: Arc<ServerMetrics>) -> Self {
        self.obs = obs;
        self
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.obs
    }

    pub fn stored(&self) -> usize {
        self.store.len()
    }

    fn validate(&self, metric: Metric) -> Result<Metric> {
        let metric = metric.normalize()?;
        if let Some(key) = &self.key {
            integrity::verify(&metric, key)?;
        }
        Ok(metric)
    }

    // Runs under the store lock.
    fn merge(&self, existing: Option<&Metric>, mut incoming: Metric) -> Result<Metric> {
        if let (MetricKind::Counter, Some(prev)) = (&incoming.kind, existing) {
            let base = prev.delta.unwrap_or(0);
            let delta = incoming.delta.unwrap_or(0);
            let sum = base.checked_add(delta).ok_or_else(|| {
                MetricsError::BadFormat(format!(
                    "counter `{}` overflows: {base} + {delta}",
                    incoming.id
                ))
            })?;
            incoming.delta = Some(sum);
        }
        match &self.key {
            Some(key) => integrity::stamp(&mut incoming, key)?,
            // A client hash over the pre-merge value would be stale.
            None => incoming.hash = None,
        }
        Ok(incoming)
    }

    fn stamped(&self, mut metric: Metric) -> Metric {
        if let Some(key) = &self.key {
            if let Err(e) = integrity::stamp(&mut metric, key) {
                tracing::warn!(id = %metric.id, error = %e, "failed to stamp stored metric");
                metric.hash = None;
            }
        }
        metric
    }

    async fn after_write(&self) {
        if let Some(dumper) = &self.sync_dump {
            // The dumper logs failures; the write itself already succeeded.
            let _ = dumper.dump(DumpTrigger::Write).await;
        }
    }

    /// Validate, merge and store one metric. Returns the stored metric.
    pub async fn update(&self, metric: Metric) -> Result<Metric> {
        let kind = metric.kind.to_string();
        let res = self
            .validate(metric)
            .and_then(|m| self.store.upsert_with(m, |prev, m| self.merge(prev, m)));

        match &res {
            Ok(m) => {
                self.obs.record_update(&kind, "ok");
                tracing::debug!(id = %m.id, kind = %m.kind, "metric updated");
            }
            Err(e) => {
                self.obs.record_update(&kind, e.client_code().as_str());
                tracing::debug!(kind = %kind, error = %e, "metric rejected");
            }
        }
        if res.is_ok() {
            self.after_write().await;
        }
        res
    }

    /// Apply every valid metric of the batch.
    ///
    /// Returns the number applied, or `PartialUpdate` when some were rejected
    /// (the valid ones are still applied).
    pub async fn bulk_update(&self, metrics: Vec<Metric>) -> Result<usize> {
        let total = metrics.len();
        let mut valid = Vec::with_capacity(total);
        let mut rejected = 0;
        for m in metrics {
            let kind = m.kind.to_string();
            let id = m.id.clone();
            match self.validate(m) {
                Ok(m) => valid.push(m),
                Err(e) => {
                    rejected += 1;
                    self.obs.record_update(&kind, e.client_code().as_str());
                    tracing::warn!(id = %id, kind = %kind, error = %e, "bulk metric rejected");
                }
            }
        }

        let (applied, failures) = self.store.upsert_many_with(valid, |prev, m| {
            let kind = m.kind.to_string();
            let res = self.merge(prev, m);
            match &res {
                Ok(_) => self.obs.record_update(&kind, "ok"),
                Err(e) => self.obs.record_update(&kind, e.client_code().as_str()),
            }
            res
        });
        for e in &failures {
            tracing::warn!(error = %e, "bulk metric merge failed");
        }
        rejected += failures.len();

        if applied > 0 {
            self.after_write().await;
        }
        tracing::debug!(total, applied, rejected, "bulk update processed");

        if rejected > 0 {
            return Err(MetricsError::PartialUpdate { applied, rejected });
        }
        Ok(applied)
    }

    /// Unknown kinds are never stored, so they report `NotFound`.
    pub fn get(&self, kind: &MetricKind, id: &str) -> Result<Metric> {
        self.store.get(kind, id).map(|m| self.stamped(m))
    }

    /// Every stored metric, sorted by id.
    pub fn get_all(&self) -> Vec<Metric> {
        self.store
            .get_all()
            .into_iter()
            .map(|m| self.stamped(m))
            .collect()
    }

    /// Backend liveness. Succeeds trivially without a backend.
    pub async fn ping(&self) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        tokio::time::timeout(PING_TIMEOUT, backend.ping())
            .await
            .map_err(|_| MetricsError::Timeout(PING_TIMEOUT))?
    }
}

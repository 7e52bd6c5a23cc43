//! In-memory metric store.
//!
//! A single mutex guards the map and every snapshot copy. The lock is never
//! held across I/O or `.await`, so hold times stay bounded by map access.
//! Business rules live in the repository; the store only offers verbatim
//! writes plus `upsert_with`, which runs a caller-supplied merge under the
//! same lock acquisition as the write so read-modify-write cycles on one key
//! cannot interleave.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use metricsd_core::error::{MetricsError, Result};
use metricsd_core::{Metric, MetricKey, MetricKind};

#[derive(Default)]
pub struct Store {
    entries: Mutex<HashMap<MetricKey, Metric>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // The map stays consistent even if a holder panicked: every write is a
    // single insert.
    fn lock(&self) -> MutexGuard<'_, HashMap<MetricKey, Metric>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, kind: &MetricKind, id: &str) -> Result<Metric> {
        let key = MetricKey::new(kind.clone(), id);
        self.lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| MetricsError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })
    }

    /// Snapshot sorted by id, gauges before counters on equal ids.
    pub fn get_all(&self) -> Vec<Metric> {
        let mut all: Vec<Metric> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.kind.cmp(&b.kind)));
        all
    }

    pub fn upsert(&self, metric: Metric) {
        self.lock().insert(metric.key(), metric);
    }

    /// Each insert takes the lock on its own; the batch is not atomic.
    pub fn bulk_upsert(&self, metrics: impl IntoIterator<Item = Metric>) {
        for m in metrics {
            self.upsert(m);
        }
    }

    /// Merge `incoming` with the current entry and store the result atomically.
    ///
    /// On merge failure the entry is left untouched.
    pub fn upsert_with<F>(&self, incoming: Metric, merge: F) -> Result<Metric>
    where
        F: FnOnce(Option<&Metric>, Metric) -> Result<Metric>,
    {
        let key = incoming.key();
        let mut entries = self.lock();
        let merged = merge(entries.get(&key), incoming)?;
        entries.insert(key, merged.clone());
        Ok(merged)
    }

    /// Batch form of [`Store::upsert_with`] under one lock acquisition.
    ///
    /// Items merge in order, so repeated keys in one batch accumulate.
    /// Returns the number stored and the failures.
    pub fn upsert_many_with<F>(&self, batch: Vec<Metric>, merge: F) -> (usize, Vec<MetricsError>)
    where
        F: Fn(Option<&Metric>, Metric) -> Result<Metric>,
    {
        let mut entries = self.lock();
        let mut applied = 0;
        let mut failures = Vec::new();
        for incoming in batch {
            let key = incoming.key();
            match merge(entries.get(&key), incoming) {
                Ok(merged) => {
                    entries.insert(key, merged);
                    applied += 1;
                }
                Err(e) => failures.push(e),
            }
        }
        (applied, failures)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

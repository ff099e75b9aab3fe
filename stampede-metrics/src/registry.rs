use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::metric::{MetricKind, MetricSnapshot, MetricValues, Storage};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("metric `{name}` is a {existing}, cannot record it as a {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },
}

/// Writer-side handle to a single metric. Cheap to clone; hot paths hold one
/// of these instead of re-resolving the name on every observation.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    storage: Arc<Storage>,
}

impl MetricHandle {
    /// Records a numeric observation (Counter add, Trend sample). No-op on a
    /// Rate metric; use [`MetricHandle::add_bool`].
    #[inline]
    pub fn add(&self, value: f64) {
        match &*self.storage {
            Storage::Counter(c) => c.add(value),
            Storage::Trend(t) => t.record(value),
            Storage::Rate(_) => {}
        }
    }

    /// Records a boolean outcome on a Rate metric. No-op on other kinds.
    #[inline]
    pub fn add_bool(&self, pass: bool) {
        if let Storage::Rate(r) = &*self.storage {
            r.add(pass);
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.storage.kind()
    }
}

/// Thread-safe metric store for one run. Metrics are created lazily on first
/// use, their kind is fixed on creation, and they are never deleted while the
/// run is live. Per-metric state only; there is no registry-wide lock on the
/// record path.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: DashMap<Arc<str>, Arc<Storage>>,
}

impl Registry {
    /// Resolves (creating if needed) the named metric and returns a handle.
    /// Fails if the name already exists with a different kind.
    pub fn handle(&self, name: &str, kind: MetricKind) -> Result<MetricHandle, MetricError> {
        if let Some(existing) = self.metrics.get(name) {
            let existing_kind = existing.kind();
            if existing_kind != kind {
                return Err(MetricError::KindConflict {
                    name: name.to_string(),
                    existing: existing_kind,
                    requested: kind,
                });
            }
            return Ok(MetricHandle {
                storage: existing.clone(),
            });
        }

        let entry = self
            .metrics
            .entry(Arc::from(name))
            .or_insert_with(|| Arc::new(Storage::new(kind)));
        let storage = entry.clone();
        drop(entry);

        // Entry may have been created by a racing writer with another kind.
        if storage.kind() != kind {
            return Err(MetricError::KindConflict {
                name: name.to_string(),
                existing: storage.kind(),
                requested: kind,
            });
        }

        Ok(MetricHandle { storage })
    }

    pub fn add(&self, name: &str, kind: MetricKind, value: f64) -> Result<(), MetricError> {
        self.handle(name, kind)?.add(value);
        Ok(())
    }

    pub fn add_bool(&self, name: &str, pass: bool) -> Result<(), MetricError> {
        self.handle(name, MetricKind::Rate)?.add_bool(pass);
        Ok(())
    }

    /// Immutable point-in-time view of every metric, sorted by name.
    ///
    /// `elapsed` is the run duration used for Counter rates; callers take the
    /// snapshot only after all writers have stopped.
    pub fn snapshot(&self, elapsed: Duration) -> Vec<MetricSnapshot> {
        let secs = elapsed.as_secs_f64();

        let mut out: Vec<MetricSnapshot> = self
            .metrics
            .iter()
            .map(|entry| {
                let values = match &**entry.value() {
                    Storage::Counter(c) => {
                        let count = c.get();
                        let rate = if secs > 0.0 { count / secs } else { 0.0 };
                        MetricValues::Counter { count, rate }
                    }
                    Storage::Rate(r) => r.summarize(),
                    Storage::Trend(t) => t.summarize(),
                };

                MetricSnapshot {
                    name: entry.key().to_string(),
                    kind: entry.value().kind(),
                    values,
                }
            })
            .collect();

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

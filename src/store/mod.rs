//! Thread-safe in-memory time series, keyed by `(resource_id, metric_name)`.
//!
//! Grounded on the teacher's general "collection behind a lock" shape, but
//! the lock layout here is two-tiered: the outer `RwLock` only ever guards
//! the `HashMap` of series handles, so looking up an existing series never
//! blocks writers/readers of an unrelated series. Each series' own samples
//! live behind their own `RwLock`, which is where real contention happens.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub resource_id: String,
    pub metric_name: String,
}

impl SeriesKey {
    pub fn new(resource_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            metric_name: metric_name.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("insufficient data")]
    InsufficientData,
}

#[derive(Debug, Clone, Copy)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

type SeriesHandle = Arc<RwLock<Vec<Sample>>>;

pub struct MetricsStore {
    series: RwLock<HashMap<SeriesKey, SeriesHandle>>,
    clock: Arc<dyn Clock>,
}

impl MetricsStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn handle_for(&self, key: &SeriesKey) -> SeriesHandle {
        if let Some(handle) = self.series.read().unwrap().get(key) {
            return handle.clone();
        }
        let mut write_guard = self.series.write().unwrap();
        write_guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone()
    }

    pub fn store(&self, resource: &str, metric: &str, value: f64, timestamp: DateTime<Utc>) {
        let key = SeriesKey::new(resource, metric);
        let handle = self.handle_for(&key);
        handle.write().unwrap().push(Sample { timestamp, value });
    }

    /// Ascending-by-timestamp samples within `[now - duration, now]`.
    pub fn query(&self, resource: &str, metric: &str, duration: chrono::Duration) -> Vec<Sample> {
        let key = SeriesKey::new(resource, metric);
        let Some(handle) = self.series.read().unwrap().get(&key).cloned() else {
            return Vec::new();
        };
        let now = self.clock.now();
        let cutoff = now - duration;
        let mut out: Vec<Sample> = handle
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.timestamp >= cutoff && s.timestamp <= now)
            .copied()
            .collect();
        out.sort_by_key(|s| s.timestamp);
        out
    }

    pub fn percentiles(
        &self,
        resource: &str,
        metric: &str,
        duration: chrono::Duration,
    ) -> Result<Percentiles, StoreError> {
        let samples = self.query(resource, metric, duration);
        if samples.is_empty() {
            return Err(StoreError::InsufficientData);
        }
        let mut values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        Ok(Percentiles {
            p50: percentile(&mut values, 50.0),
            p95: percentile(&mut values, 95.0),
            p99: percentile(&mut values, 99.0),
        })
    }

    /// Drops every Sample older than `retention`; removes the series entry
    /// entirely once it becomes empty. Returns the number of samples removed.
    pub fn sweep(&self, retention: chrono::Duration) -> usize {
        let now = self.clock.now();
        let cutoff = now - retention;
        let handles: Vec<(SeriesKey, SeriesHandle)> = self
            .series
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut removed = 0;
        let mut emptied = Vec::new();
        for (key, handle) in handles {
            let mut guard = handle.write().unwrap();
            let before = guard.len();
            guard.retain(|s| s.timestamp >= cutoff);
            removed += before - guard.len();
            if guard.is_empty() {
                emptied.push(key);
            }
        }

        if !emptied.is_empty() {
            let mut write_guard = self.series.write().unwrap();
            for key in emptied {
                if let Some(handle) = write_guard.get(&key) {
                    if handle.read().unwrap().is_empty() {
                        write_guard.remove(&key);
                    }
                }
            }
        }

        removed
    }
}

/// Linear interpolation between adjacent order statistics. `values` is
/// sorted in place. For `n=1`, returns the sole value for every `p`.
/// For `n=0`, returns `0.0` rather than indexing an empty slice.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return values[0];
    }
    let idx = (p / 100.0) * (n - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return values[lo];
    }
    values[lo] + (idx - lo as f64) * (values[hi] - values[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn clock_at(secs: i64) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(secs, 0).unwrap()))
    }

    #[test]
    fn retention_sweep_drops_only_expired_samples() {
        let clock = clock_at(100_000);
        let store = MetricsStore::new(clock.clone());
        store.store("pod/a", "cpu", 100.0, Utc.timestamp_opt(100_000 - 90_000, 0).unwrap());
        store.store("pod/a", "cpu", 200.0, Utc.timestamp_opt(100_000 - 1_800, 0).unwrap());

        let removed = store.sweep(chrono::Duration::seconds(86_400));
        assert_eq!(removed, 1);

        let samples = store.query("pod/a", "cpu", chrono::Duration::seconds(86_400));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 200.0);

        let pct = store
            .percentiles("pod/a", "cpu", chrono::Duration::seconds(86_400))
            .unwrap();
        assert_eq!(pct.p50, 200.0);
        assert_eq!(pct.p95, 200.0);
        assert_eq!(pct.p99, 200.0);
    }

    #[test]
    fn percentile_interpolation_matches_spec_example() {
        let clock = clock_at(1_000);
        let store = MetricsStore::new(clock);
        for (i, v) in [10., 20., 30., 40., 50., 60., 70., 80., 90., 100.]
            .into_iter()
            .enumerate()
        {
            store.store("pod/a", "cpu", v, Utc.timestamp_opt(1_000 + i as i64, 0).unwrap());
        }
        let pct = store
            .percentiles("pod/a", "cpu", chrono::Duration::seconds(60))
            .unwrap();
        assert!((pct.p50 - 55.0).abs() < 1e-3);
        assert!((pct.p95 - 95.5).abs() < 1e-3);
        assert!((pct.p99 - 99.1).abs() < 1e-3);
    }

    #[test]
    fn percentile_single_value_returns_that_value_for_all_bands() {
        let clock = clock_at(1);
        let store = MetricsStore::new(clock);
        store.store("pod/a", "cpu", 42.0, Utc.timestamp_opt(1, 0).unwrap());
        let pct = store
            .percentiles("pod/a", "cpu", chrono::Duration::seconds(60))
            .unwrap();
        assert_eq!((pct.p50, pct.p95, pct.p99), (42.0, 42.0, 42.0));
    }

    #[test]
    fn percentile_on_missing_series_is_insufficient_data() {
        let clock = clock_at(1);
        let store = MetricsStore::new(clock);
        let err = store
            .percentiles("pod/missing", "cpu", chrono::Duration::seconds(60))
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientData));
    }

    #[test]
    fn percentile_of_empty_slice_is_zero_not_a_panic() {
        let mut values: Vec<f64> = Vec::new();
        assert_eq!(percentile(&mut values, 95.0), 0.0);
    }

    #[test]
    fn query_on_missing_series_is_empty_not_an_error() {
        let clock = clock_at(1);
        let store = MetricsStore::new(clock);
        assert!(store.query("pod/missing", "cpu", chrono::Duration::seconds(60)).is_empty());
    }
}

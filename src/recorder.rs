use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::alerts::AlertEngine;
use crate::cache::{best_effort, CacheAdapter};
use crate::config::{MEASUREMENT_CAP, MEASUREMENT_KEEP, METRIC_TTL_SECS};
use crate::series::BoundedSeries;
use crate::types::{Measurement, MetricKind};

/// Accepts measurements, keeps a bounded in-memory history, mirrors each
/// one to the cache collaborator, and feeds the alert engine.
pub struct MetricRecorder {
    measurements: RwLock<BoundedSeries<Measurement>>,
    cache: Option<Arc<dyn CacheAdapter>>,
    alerts: Arc<AlertEngine>,
}

impl MetricRecorder {
    pub fn new(cache: Option<Arc<dyn CacheAdapter>>, alerts: Arc<AlertEngine>) -> Self {
        Self {
            measurements: RwLock::new(BoundedSeries::new(MEASUREMENT_CAP, MEASUREMENT_KEEP)),
            cache,
            alerts,
        }
    }

    /// Record a fully-formed measurement. The in-memory append always
    /// succeeds; the cache mirror is best-effort.
    pub async fn record(&self, measurement: Measurement) {
        {
            let mut measurements = self.measurements.write().await;
            measurements.append(measurement.clone());
        }

        if let Some(cache) = &self.cache {
            let key = format!(
                "metric:{}:{}",
                measurement.name,
                measurement.timestamp.timestamp()
            );
            best_effort(
                "mirror metric",
                cache.set_hash(&key, measurement.to_fields(), METRIC_TTL_SECS),
            )
            .await;
        }

        self.alerts.evaluate(&measurement).await;
    }

    /// Convenience constructor + record in one call.
    pub async fn record_value(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        tags: HashMap<String, String>,
    ) {
        self.record(Measurement::new(name, value, kind, tags)).await;
    }

    /// Measurements newer than `window`, oldest first.
    pub async fn recent(&self, window: Duration) -> Vec<Measurement> {
        let cutoff = window_cutoff(window);
        let measurements = self.measurements.read().await;
        measurements
            .iter()
            .filter(|m| m.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// Measurements with a given name newer than `window`, oldest first.
    pub async fn named_within(&self, name: &str, window: Duration) -> Vec<Measurement> {
        let cutoff = window_cutoff(window);
        let measurements = self.measurements.read().await;
        measurements
            .iter()
            .filter(|m| m.name == name && m.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// Count of recent measurements whose name passes `pred`.
    pub async fn count_recent(
        &self,
        window: Duration,
        pred: impl Fn(&Measurement) -> bool,
    ) -> usize {
        let cutoff = window_cutoff(window);
        let measurements = self.measurements.read().await;
        measurements
            .iter()
            .filter(|m| m.timestamp > cutoff && pred(m))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.measurements.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.measurements.read().await.is_empty()
    }

    /// Oldest and newest retained values for a named metric, for tests and
    /// trim diagnostics.
    pub async fn first_last(&self, name: &str) -> Option<(f64, f64)> {
        let measurements = self.measurements.read().await;
        let mut values = measurements.iter().filter(|m| m.name == name);
        let first = values.next()?.value;
        let last = values.last().map(|m| m.value).unwrap_or(first);
        Some((first, last))
    }
}

fn window_cutoff(window: Duration) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

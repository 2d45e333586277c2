use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::AlertEngine;
use crate::cache::{best_effort, CacheAdapter};
use crate::config::DASHBOARD_TTL_SECS;
use crate::performance::PerformanceTracker;
use crate::recorder::MetricRecorder;
use crate::sysmem::{self, round2};
use crate::types::Alert;

const RECENT_WINDOW: Duration = Duration::from_secs(5 * 60);
const ERROR_WINDOW: Duration = Duration::from_secs(60 * 60);
const DASHBOARD_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Point-in-time view of the running system.
#[derive(Debug, Clone, Serialize)]
pub struct RealTimeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub active_users: u64,
    pub active_connections: u64,
    pub metrics_last_5min: usize,
    pub errors_last_hour: usize,
    pub avg_response_time_ms: f64,
    pub memory: MemorySection,
    pub active_alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySection {
    pub process_rss_mb: f64,
    pub process_virtual_mb: f64,
    pub host_used_percent: f64,
}

/// 24-hour aggregate for one metric name.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDashboard {
    pub current_value: f64,
    pub avg_24h: f64,
    pub min_24h: f64,
    pub max_24h: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: HashMap<String, MetricDashboard>,
}

/// Builds the real-time snapshot and the 24-hour dashboard from the
/// recorder, alert engine, performance tracker and cache.
pub struct SnapshotComposer {
    recorder: Arc<MetricRecorder>,
    alerts: Arc<AlertEngine>,
    performance: Arc<PerformanceTracker>,
    cache: Option<Arc<dyn CacheAdapter>>,
}

impl SnapshotComposer {
    pub fn new(
        recorder: Arc<MetricRecorder>,
        alerts: Arc<AlertEngine>,
        performance: Arc<PerformanceTracker>,
        cache: Option<Arc<dyn CacheAdapter>>,
    ) -> Self {
        Self {
            recorder,
            alerts,
            performance,
            cache,
        }
    }

    pub async fn real_time(&self) -> RealTimeSnapshot {
        let (active_users, active_connections) = self.connection_counts().await;
        let memory = sysmem::sample();

        RealTimeSnapshot {
            timestamp: Utc::now(),
            active_users,
            active_connections,
            metrics_last_5min: self.recorder.recent(RECENT_WINDOW).await.len(),
            errors_last_hour: self
                .recorder
                .count_recent(ERROR_WINDOW, |m| m.name.ends_with("error"))
                .await,
            avg_response_time_ms: self.performance.global_average().avg_ms,
            memory: MemorySection {
                process_rss_mb: memory.process_rss_mb,
                process_virtual_mb: memory.process_virtual_mb,
                host_used_percent: memory.host_used_percent,
            },
            active_alerts: self.alerts.active().await,
        }
    }

    /// One user holds one `websocket:user:<id>` set; the set members are
    /// their open connections.
    async fn connection_counts(&self) -> (u64, u64) {
        let Some(cache) = &self.cache else {
            return (0, 0);
        };
        let Some(keys) = best_effort("list websocket keys", cache.list_keys("websocket:user:*")).await
        else {
            return (0, 0);
        };

        let mut connections = 0u64;
        for key in &keys {
            if let Some(count) =
                best_effort("websocket set size", cache.set_cardinality(key)).await
            {
                connections += count;
            }
        }
        (keys.len() as u64, connections)
    }

    /// 24-hour aggregates for the requested metric names, under a
    /// caller-chosen dashboard name. Requested metrics with no
    /// measurements in the window are omitted.
    pub async fn dashboard(&self, name: &str, metric_names: &[String]) -> Dashboard {
        let mut metrics = HashMap::new();
        for metric_name in metric_names {
            let window = self
                .recorder
                .named_within(metric_name, DASHBOARD_WINDOW)
                .await;
            if window.is_empty() {
                continue;
            }
            let count = window.len();
            let sum: f64 = window.iter().map(|m| m.value).sum();
            let min = window.iter().map(|m| m.value).fold(f64::INFINITY, f64::min);
            let max = window
                .iter()
                .map(|m| m.value)
                .fold(f64::NEG_INFINITY, f64::max);
            let current = window[count - 1].value;

            metrics.insert(
                metric_name.clone(),
                MetricDashboard {
                    current_value: current,
                    avg_24h: round2(sum / count as f64),
                    min_24h: min,
                    max_24h: max,
                    data_points: count,
                },
            );
        }

        let dashboard = Dashboard {
            name: name.to_string(),
            generated_at: Utc::now(),
            metrics,
        };

        if let Some(cache) = &self.cache {
            if let Ok(json) = serde_json::to_string(&dashboard) {
                let fields = HashMap::from([("json".to_string(), json)]);
                best_effort(
                    "mirror dashboard",
                    cache.set_hash(&format!("dashboard:{}", name), fields, DASHBOARD_TTL_SECS),
                )
                .await;
            }
        }

        dashboard
    }
}

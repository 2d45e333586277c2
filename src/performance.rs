use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use crate::alerts::AlertEngine;
use crate::config::{OPERATION_CAP, OPERATION_KEEP};
use crate::recorder::MetricRecorder;
use crate::series::BoundedSeries;
use crate::sysmem::round2;
use crate::types::{AlertLevel, Measurement, MetricKind};

/// Mean duration over every retained sample, with the sample count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GlobalAverage {
    pub avg_ms: f64,
    pub total_samples: usize,
}

/// Aggregate statistics for one tracked operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub operation: String,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub count: usize,
}

/// Tracks operation durations, keeps a bounded sample window per
/// operation, and flags operations slower than the response time
/// threshold.
pub struct PerformanceTracker {
    samples: DashMap<String, BoundedSeries<f64>>,
    recorder: Arc<MetricRecorder>,
    alerts: Arc<AlertEngine>,
    slow_threshold_ms: f64,
}

impl PerformanceTracker {
    pub fn new(
        recorder: Arc<MetricRecorder>,
        alerts: Arc<AlertEngine>,
        slow_threshold_ms: f64,
    ) -> Self {
        Self {
            samples: DashMap::new(),
            recorder,
            alerts,
            slow_threshold_ms,
        }
    }

    /// Record one timed operation. Emits a timer measurement named
    /// `performance.<operation>.duration` tagged with the outcome status
    /// and raises a slow-operation alert when the duration exceeds the
    /// response time threshold.
    pub async fn record(&self, operation: &str, duration_ms: f64, status: &str) {
        // DashMap guards are not Send, so the append is scoped before
        // any await point.
        {
            let mut entry = self
                .samples
                .entry(operation.to_string())
                .or_insert_with(|| BoundedSeries::new(OPERATION_CAP, OPERATION_KEEP));
            entry.append(duration_ms);
        }

        let mut tags = HashMap::new();
        tags.insert("operation".to_string(), operation.to_string());
        tags.insert("status".to_string(), status.to_string());
        self.recorder
            .record(Measurement::new(
                &format!("performance.{}.duration", operation),
                duration_ms,
                MetricKind::Timer,
                tags,
            ))
            .await;

        if duration_ms > self.slow_threshold_ms {
            let mut metadata = HashMap::new();
            metadata.insert("operation".to_string(), Value::from(operation));
            metadata.insert("duration_ms".to_string(), Value::from(duration_ms));
            metadata.insert(
                "threshold_ms".to_string(),
                Value::from(self.slow_threshold_ms),
            );
            self.alerts
                .create(
                    &format!("slow_operation_{}", operation),
                    "Slow Operation",
                    AlertLevel::Warning,
                    &format!(
                        "{} took {}ms, above the {}ms limit",
                        operation, duration_ms, self.slow_threshold_ms
                    ),
                    metadata,
                )
                .await;
        }
    }

    /// Statistics for one operation, or None when it was never recorded.
    pub fn summary(&self, operation: &str) -> Option<OperationSummary> {
        let samples = self.samples.get(operation)?;
        summarize(operation, &samples)
    }

    /// Statistics for every tracked operation.
    pub fn summary_all(&self) -> HashMap<String, OperationSummary> {
        self.samples
            .iter()
            .filter_map(|entry| {
                summarize(entry.key(), entry.value()).map(|s| (entry.key().clone(), s))
            })
            .collect()
    }

    /// Mean duration and sample count folded across every operation.
    pub fn global_average(&self) -> GlobalAverage {
        let mut sum = 0.0;
        let mut count = 0usize;
        for entry in self.samples.iter() {
            sum += entry.value().iter().sum::<f64>();
            count += entry.value().len();
        }
        GlobalAverage {
            avg_ms: if count == 0 {
                0.0
            } else {
                round2(sum / count as f64)
            },
            total_samples: count,
        }
    }

    pub fn tracked_operations(&self) -> usize {
        self.samples.len()
    }
}

fn summarize(operation: &str, samples: &BoundedSeries<f64>) -> Option<OperationSummary> {
    if samples.is_empty() {
        return None;
    }
    let count = samples.len();
    let sum: f64 = samples.iter().sum();
    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(OperationSummary {
        operation: operation.to_string(),
        avg_ms: round2(sum / count as f64),
        min_ms: min,
        max_ms: max,
        count,
    })
}

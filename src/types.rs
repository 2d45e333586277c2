use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a recorded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
        }
    }
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }
}

/// A single named, typed, timestamped observation. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    pub kind: MetricKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Measurement {
    pub fn new(name: &str, value: f64, kind: MetricKind, tags: HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            value,
            kind,
            timestamp: Utc::now(),
            tags,
        }
    }

    /// Flat string map used when mirroring a measurement to the cache hash.
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::from([
            ("name".to_string(), self.name.clone()),
            ("value".to_string(), self.value.to_string()),
            ("type".to_string(), self.kind.as_str().to_string()),
            ("timestamp".to_string(), self.timestamp.to_rfc3339()),
        ]);
        if !self.tags.is_empty() {
            fields.insert(
                "tags".to_string(),
                serde_json::to_string(&self.tags).unwrap_or_default(),
            );
        }
        fields
    }
}

/// An alert raised by the engine. `id` is the dedup key: at most one
/// unresolved alert per id exists at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub name: String,
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Alert {
    pub fn new(
        id: &str,
        name: &str,
        level: AlertLevel,
        message: &str,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            resolved: false,
            metadata,
        }
    }

    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("id".to_string(), self.id.clone()),
            ("name".to_string(), self.name.clone()),
            ("level".to_string(), self.level.as_str().to_string()),
            ("message".to_string(), self.message.clone()),
            ("timestamp".to_string(), self.timestamp.to_rfc3339()),
            ("resolved".to_string(), self.resolved.to_string()),
        ])
    }
}

/// Status of a single probed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Slow,
    Unhealthy,
    Error,
}

/// Overall status folded from the component statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Error,
}

/// Result of probing one subsystem. Probe failures are converted into this
/// shape rather than propagated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, flatten)]
    pub details: serde_json::Map<String, Value>,
}

impl ComponentHealth {
    pub fn healthy(response_time_ms: f64, slow_after_ms: f64) -> Self {
        let status = if response_time_ms > slow_after_ms {
            ComponentStatus::Slow
        } else {
            ComponentStatus::Healthy
        };
        Self {
            status,
            response_time_ms: Some((response_time_ms * 100.0).round() / 100.0),
            connected: true,
            error: None,
            details: serde_json::Map::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            response_time_ms: None,
            connected: false,
            error: Some(error.into()),
            details: serde_json::Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Slow still counts as healthy for aggregation purposes; only
    /// unhealthy/error components are reported as issues.
    pub fn is_issue(&self) -> bool {
        matches!(
            self.status,
            ComponentStatus::Unhealthy | ComponentStatus::Error
        )
    }
}

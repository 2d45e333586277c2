use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Measurement buffer: hard cap and post-trim size.
pub const MEASUREMENT_CAP: usize = 10_000;
pub const MEASUREMENT_KEEP: usize = 8_000;

/// Per-operation performance buffer: hard cap and post-trim size.
pub const OPERATION_CAP: usize = 1_000;
pub const OPERATION_KEEP: usize = 800;

/// TTLs for entries mirrored to the cache collaborator, in seconds.
pub const METRIC_TTL_SECS: u64 = 86_400; // 24 hours
pub const ALERT_TTL_SECS: u64 = 604_800; // 7 days
pub const ACTION_TTL_SECS: u64 = 86_400; // 24 hours
pub const USER_ANALYTICS_TTL_SECS: u64 = 604_800; // 7 days
pub const HOURLY_TTL_SECS: u64 = 172_800; // 48 hours
pub const DASHBOARD_TTL_SECS: u64 = 604_800; // 7 days

/// Numeric limits measurements are evaluated against. Immutable after
/// construction; comparison is strictly greater-than.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_response_time_ms")]
    pub response_time_ms: f64,
    #[serde(default = "default_error_rate_percent")]
    pub error_rate_percent: f64,
    #[serde(default = "default_memory_usage_percent")]
    pub memory_usage_percent: f64,
    #[serde(default = "default_active_connections")]
    pub active_connections: f64,
}

fn default_response_time_ms() -> f64 {
    1000.0
}

fn default_error_rate_percent() -> f64 {
    5.0
}

fn default_memory_usage_percent() -> f64 {
    85.0
}

fn default_active_connections() -> f64 {
    1000.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            response_time_ms: default_response_time_ms(),
            error_rate_percent: default_error_rate_percent(),
            memory_usage_percent: default_memory_usage_percent(),
            active_connections: default_active_connections(),
        }
    }
}

/// Engine configuration. All fields are optional in serialized form and
/// fall back to defaults through the accessor methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub instance_id: Option<String>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
    /// Soft latency limit before the database probe is classified slow, ms.
    pub database_soft_limit_ms: Option<f64>,
    /// Soft latency limit before the cache probe is classified slow, ms.
    pub cache_soft_limit_ms: Option<f64>,
    /// Soft latency limit before the bot probe is classified slow, ms.
    pub bot_soft_limit_ms: Option<f64>,
    /// Hard deadline for each external health probe, seconds.
    pub probe_timeout_secs: Option<u64>,
}

impl MonitorConfig {
    /// Overlay environment variables on the defaults, in the
    /// `VIGIL_*` namespace.
    pub fn from_env() -> Self {
        let mut thresholds = Thresholds::default();
        if let Some(v) = env_f64("VIGIL_RESPONSE_TIME_MS") {
            thresholds.response_time_ms = v;
        }
        if let Some(v) = env_f64("VIGIL_ERROR_RATE_PERCENT") {
            thresholds.error_rate_percent = v;
        }
        if let Some(v) = env_f64("VIGIL_MEMORY_USAGE_PERCENT") {
            thresholds.memory_usage_percent = v;
        }
        if let Some(v) = env_f64("VIGIL_ACTIVE_CONNECTIONS") {
            thresholds.active_connections = v;
        }

        Self {
            instance_id: env::var("VIGIL_INSTANCE_ID").ok(),
            thresholds: Some(thresholds),
            database_soft_limit_ms: env_f64("VIGIL_DATABASE_SOFT_LIMIT_MS"),
            cache_soft_limit_ms: env_f64("VIGIL_CACHE_SOFT_LIMIT_MS"),
            bot_soft_limit_ms: env_f64("VIGIL_BOT_SOFT_LIMIT_MS"),
            probe_timeout_secs: env::var("VIGIL_PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn get_instance_id(&self) -> String {
        self.instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.clone().unwrap_or_default()
    }

    pub fn database_soft_limit_ms(&self) -> f64 {
        self.database_soft_limit_ms.unwrap_or(1000.0)
    }

    pub fn cache_soft_limit_ms(&self) -> f64 {
        self.cache_soft_limit_ms.unwrap_or(100.0)
    }

    pub fn bot_soft_limit_ms(&self) -> f64 {
        self.bot_soft_limit_ms.unwrap_or(2000.0)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.unwrap_or(5))
    }
}

fn env_f64(name: &str) -> Option<f64> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

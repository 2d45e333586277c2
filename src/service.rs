use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::alerts::AlertEngine;
use crate::cache::{best_effort, CacheAdapter};
use crate::config::{
    MonitorConfig, ACTION_TTL_SECS, HOURLY_TTL_SECS, USER_ANALYTICS_TTL_SECS,
};
use crate::health::{HealthAggregator, HealthReport};
use crate::performance::{OperationSummary, PerformanceTracker};
use crate::probes::{BotProbe, DatabaseProbe, TopSurvey, UserActivitySummary};
use crate::recorder::MetricRecorder;
use crate::snapshot::{Dashboard, RealTimeSnapshot, SnapshotComposer};
use crate::types::{Alert, AlertLevel, Measurement, MetricKind};

/// Actions surfaced individually in the analytics report.
const COMMON_ACTIONS: &[&str] = &[
    "survey_start",
    "survey_complete",
    "question_answer",
    "telegram_interaction",
];

/// User behaviour over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct UserAnalyticsReport {
    pub period_days: i64,
    pub timestamp: DateTime<Utc>,
    pub users: UsersSection,
    pub surveys: SurveysSection,
    pub total_actions: i64,
    pub common_actions: HashMap<String, i64>,
    pub performance: HashMap<String, OperationSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsersSection {
    pub new_registrations: u64,
    pub active_users: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SurveysSection {
    pub completions: u64,
    pub top_surveys: Vec<TopSurvey>,
}

/// The monitoring engine's front door. Owns every subsystem; collaborators
/// are optional and their absence degrades features instead of failing
/// calls.
pub struct MonitoringService {
    config: MonitorConfig,
    recorder: Arc<MetricRecorder>,
    alerts: Arc<AlertEngine>,
    performance: Arc<PerformanceTracker>,
    health: HealthAggregator,
    snapshots: SnapshotComposer,
    cache: Option<Arc<dyn CacheAdapter>>,
    database: Option<Arc<dyn DatabaseProbe>>,
}

impl MonitoringService {
    pub fn builder() -> MonitoringServiceBuilder {
        MonitoringServiceBuilder::default()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record one measurement through the full pipeline: bounded history,
    /// cache mirror, threshold evaluation.
    pub async fn record_metric(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        tags: HashMap<String, String>,
    ) {
        self.recorder
            .record(Measurement::new(name, value, kind, tags))
            .await;
    }

    /// Record a timed operation with its outcome status (`"success"` for
    /// the common case). Slow operations raise a warning alert.
    pub async fn track_performance(&self, operation: &str, duration_ms: f64, status: &str) {
        self.performance.record(operation, duration_ms, status).await;
    }

    pub async fn create_alert(
        &self,
        id: &str,
        name: &str,
        level: AlertLevel,
        message: &str,
        metadata: HashMap<String, Value>,
    ) -> Option<Alert> {
        self.alerts.create(id, name, level, message, metadata).await
    }

    pub async fn resolve_alert(&self, id: &str) -> usize {
        self.alerts.resolve(id).await
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.active().await
    }

    pub async fn health_check(&self) -> HealthReport {
        self.health.check().await
    }

    pub async fn real_time_snapshot(&self) -> RealTimeSnapshot {
        self.snapshots.real_time().await
    }

    /// Build a named dashboard over the requested metric names and mirror
    /// its definition under `dashboard:<name>`.
    pub async fn create_custom_dashboard(&self, name: &str, metric_names: &[String]) -> Dashboard {
        self.snapshots.dashboard(name, metric_names).await
    }

    pub fn performance_summary(&self, operation: &str) -> Option<OperationSummary> {
        self.performance.summary(operation)
    }

    /// Count one user action: global and per-action counters, per-user
    /// hash, and the current hour's bucket. A no-op without a cache.
    /// `metadata` is accepted for call-site compatibility but not stored.
    pub async fn track_user_action(
        &self,
        user_id: i64,
        action: &str,
        _metadata: Option<HashMap<String, Value>>,
    ) {
        let Some(cache) = &self.cache else {
            return;
        };

        best_effort(
            "action counter",
            cache.increment_counter(&format!("user_action:{}", action), ACTION_TTL_SECS),
        )
        .await;
        best_effort(
            "total action counter",
            cache.increment_counter("user_action:total", ACTION_TTL_SECS),
        )
        .await;

        let user_key = format!("user_analytics:{}", user_id);
        let mut fields = best_effort("read user analytics", cache.get_hash(&user_key))
            .await
            .unwrap_or_default();
        let count: i64 = fields
            .get(action)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
            + 1;
        fields.insert(action.to_string(), count.to_string());
        fields.insert("last_action".to_string(), action.to_string());
        fields.insert("last_seen".to_string(), Utc::now().to_rfc3339());
        best_effort(
            "write user analytics",
            cache.set_hash(&user_key, fields, USER_ANALYTICS_TTL_SECS),
        )
        .await;

        let hour_key = format!("analytics:hourly:{}", Utc::now().format("%Y%m%d%H"));
        best_effort(
            "hourly counter",
            cache.increment_counter(&hour_key, HOURLY_TTL_SECS),
        )
        .await;
    }

    /// User behaviour over the trailing `days`. Database and cache
    /// sections fall back to zeros when their collaborator is missing or
    /// failing.
    pub async fn user_analytics(&self, days: i64) -> UserAnalyticsReport {
        let since = Utc::now() - chrono::Duration::days(days);

        let activity = match &self.database {
            Some(database) => match database.user_analytics(since).await {
                Ok(summary) => summary,
                Err(error) => {
                    tracing::error!(error = %error, "user analytics query failed");
                    UserActivitySummary::default()
                }
            },
            None => UserActivitySummary::default(),
        };

        let mut total_actions = 0;
        let mut common_actions = HashMap::new();
        if let Some(cache) = &self.cache {
            total_actions = best_effort(
                "total action counter",
                cache.get_counter("user_action:total"),
            )
            .await
            .unwrap_or(0);
            for action in COMMON_ACTIONS {
                let count = best_effort(
                    "action counter",
                    cache.get_counter(&format!("user_action:{}", action)),
                )
                .await
                .unwrap_or(0);
                if count > 0 {
                    common_actions.insert(action.to_string(), count);
                }
            }
        }

        UserAnalyticsReport {
            period_days: days,
            timestamp: Utc::now(),
            users: UsersSection {
                new_registrations: activity.new_registrations,
                active_users: activity.active_users,
            },
            surveys: SurveysSection {
                completions: activity.survey_completions,
                top_surveys: activity.top_surveys,
            },
            total_actions,
            common_actions,
            performance: self.performance.summary_all(),
        }
    }
}

/// Wires the subsystems together. Collaborators not supplied stay absent;
/// the built service still records, alerts and snapshots locally.
#[derive(Default)]
pub struct MonitoringServiceBuilder {
    config: Option<MonitorConfig>,
    cache: Option<Arc<dyn CacheAdapter>>,
    database: Option<Arc<dyn DatabaseProbe>>,
    bot: Option<Arc<dyn BotProbe>>,
}

impl MonitoringServiceBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheAdapter>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn database(mut self, database: Arc<dyn DatabaseProbe>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn bot(mut self, bot: Arc<dyn BotProbe>) -> Self {
        self.bot = Some(bot);
        self
    }

    pub fn build(self) -> MonitoringService {
        let config = self.config.unwrap_or_default();
        let thresholds = config.thresholds();

        let alerts = Arc::new(AlertEngine::new(thresholds.clone(), self.cache.clone()));
        let recorder = Arc::new(MetricRecorder::new(self.cache.clone(), alerts.clone()));
        let performance = Arc::new(PerformanceTracker::new(
            recorder.clone(),
            alerts.clone(),
            thresholds.response_time_ms,
        ));
        let health = HealthAggregator::new(
            self.database.clone(),
            self.cache.clone(),
            self.bot,
            recorder.clone(),
            alerts.clone(),
            performance.clone(),
            config.clone(),
        );
        let snapshots = SnapshotComposer::new(
            recorder.clone(),
            alerts.clone(),
            performance.clone(),
            self.cache.clone(),
        );

        tracing::info!(
            instance_id = %config.get_instance_id(),
            has_cache = self.cache.is_some(),
            has_database = self.database.is_some(),
            "monitoring service ready"
        );

        MonitoringService {
            config,
            recorder,
            alerts,
            performance,
            health,
            snapshots,
            cache: self.cache,
            database: self.database,
        }
    }
}

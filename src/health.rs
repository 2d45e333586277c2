use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::alerts::AlertEngine;
use crate::cache::CacheAdapter;
use crate::config::MonitorConfig;
use crate::performance::PerformanceTracker;
use crate::probes::{BotProbe, DatabaseProbe};
use crate::recorder::MetricRecorder;
use crate::sysmem::round2;
use crate::types::{ComponentHealth, SystemStatus};

/// One full health check result. `issues` names the failing components,
/// absent when everything is healthy.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: SystemStatus,
    pub timestamp: DateTime<Utc>,
    pub components: HashMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
}

/// Probes the engine's collaborators concurrently and folds the results
/// into an overall status.
pub struct HealthAggregator {
    database: Option<Arc<dyn DatabaseProbe>>,
    cache: Option<Arc<dyn CacheAdapter>>,
    bot: Option<Arc<dyn BotProbe>>,
    recorder: Arc<MetricRecorder>,
    alerts: Arc<AlertEngine>,
    performance: Arc<PerformanceTracker>,
    config: MonitorConfig,
    started_at: Instant,
}

impl HealthAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database: Option<Arc<dyn DatabaseProbe>>,
        cache: Option<Arc<dyn CacheAdapter>>,
        bot: Option<Arc<dyn BotProbe>>,
        recorder: Arc<MetricRecorder>,
        alerts: Arc<AlertEngine>,
        performance: Arc<PerformanceTracker>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            database,
            cache,
            bot,
            recorder,
            alerts,
            performance,
            config,
            started_at: Instant::now(),
        }
    }

    /// Probe every component concurrently. Each external probe runs under
    /// a hard deadline; the application self-check is local and cannot
    /// hang.
    pub async fn check(&self) -> HealthReport {
        let deadline = self.config.probe_timeout();
        let (database, cache, application, bot) = tokio::join!(
            self.guarded("database", deadline, self.check_database()),
            self.guarded("cache", deadline, self.check_cache()),
            self.check_application(),
            self.guarded("bot", deadline, self.check_bot()),
        );

        let mut components = HashMap::new();
        components.insert("database".to_string(), database);
        components.insert("cache".to_string(), cache);
        components.insert("application".to_string(), application);
        components.insert("bot".to_string(), bot);

        let mut issues: Vec<String> = components
            .iter()
            .filter(|(_, c)| c.is_issue())
            .map(|(name, _)| name.clone())
            .collect();
        issues.sort();

        let status = match issues.len() {
            0 => SystemStatus::Healthy,
            1 => SystemStatus::Degraded,
            _ => SystemStatus::Unhealthy,
        };

        if status != SystemStatus::Healthy {
            tracing::warn!(status = ?status, issues = ?issues, "health check found problems");
        }

        HealthReport {
            status,
            timestamp: Utc::now(),
            components,
            issues: if issues.is_empty() { None } else { Some(issues) },
        }
    }

    async fn guarded(
        &self,
        component: &str,
        deadline: std::time::Duration,
        probe: impl std::future::Future<Output = ComponentHealth>,
    ) -> ComponentHealth {
        match timeout(deadline, probe).await {
            Ok(health) => health,
            Err(_) => {
                tracing::error!(component, ?deadline, "health probe timed out");
                ComponentHealth::failed(&format!("probe timed out after {:?}", deadline))
            }
        }
    }

    async fn check_database(&self) -> ComponentHealth {
        let Some(database) = &self.database else {
            return ComponentHealth::failed("not configured");
        };
        let start = Instant::now();
        match database.liveness().await {
            Ok(liveness) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                ComponentHealth::healthy(elapsed_ms, self.config.database_soft_limit_ms())
                    .with_detail("total_users", Value::from(liveness.total_users))
            }
            Err(error) => {
                tracing::error!(error = %error, "database health probe failed");
                ComponentHealth::failed(&error.to_string())
            }
        }
    }

    async fn check_cache(&self) -> ComponentHealth {
        let Some(cache) = &self.cache else {
            return ComponentHealth::failed("not configured");
        };
        let start = Instant::now();
        match cache.ping().await {
            Ok(()) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                let mut health =
                    ComponentHealth::healthy(elapsed_ms, self.config.cache_soft_limit_ms());
                if let Ok(stats) = cache.stats().await {
                    for (name, value) in stats {
                        health = health.with_detail(&name, Value::from(value));
                    }
                }
                health
            }
            Err(error) => {
                tracing::error!(error = %error, "cache health probe failed");
                ComponentHealth::failed(&error.to_string())
            }
        }
    }

    async fn check_application(&self) -> ComponentHealth {
        ComponentHealth::healthy(0.0, f64::INFINITY)
            .with_detail(
                "total_metrics",
                Value::from(self.recorder.len().await as u64),
            )
            .with_detail(
                "active_alerts",
                Value::from(self.alerts.active_count().await as u64),
            )
            .with_detail(
                "tracked_operations",
                Value::from(self.performance.tracked_operations() as u64),
            )
            .with_detail(
                "uptime_secs",
                Value::from(round2(self.started_at.elapsed().as_secs_f64())),
            )
    }

    async fn check_bot(&self) -> ComponentHealth {
        let Some(bot) = &self.bot else {
            return ComponentHealth::failed("not configured");
        };
        let start = Instant::now();
        match bot.identity().await {
            Ok(identity) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                ComponentHealth::healthy(elapsed_ms, self.config.bot_soft_limit_ms())
                    .with_detail("username", Value::from(identity.username))
            }
            Err(error) => {
                tracing::error!(error = %error, "bot health probe failed");
                ComponentHealth::failed(&error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Thresholds;
    use crate::probes::{BotIdentity, DatabaseLiveness, UserActivitySummary};
    use anyhow::Result;
    use async_trait::async_trait;

    struct StubDatabase {
        fail: bool,
    }

    #[async_trait]
    impl DatabaseProbe for StubDatabase {
        async fn liveness(&self) -> Result<DatabaseLiveness> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(DatabaseLiveness { total_users: 12 })
        }

        async fn user_analytics(&self, _since: DateTime<Utc>) -> Result<UserActivitySummary> {
            Ok(UserActivitySummary::default())
        }
    }

    struct StubBot {
        fail: bool,
    }

    #[async_trait]
    impl BotProbe for StubBot {
        async fn identity(&self) -> Result<BotIdentity> {
            if self.fail {
                anyhow::bail!("unauthorized");
            }
            Ok(BotIdentity {
                username: "quizbot".to_string(),
            })
        }
    }

    fn aggregator(db_fail: bool, bot: Option<bool>) -> HealthAggregator {
        let alerts = Arc::new(AlertEngine::new(Thresholds::default(), None));
        let recorder = Arc::new(MetricRecorder::new(None, alerts.clone()));
        let performance = Arc::new(PerformanceTracker::new(
            recorder.clone(),
            alerts.clone(),
            1000.0,
        ));
        HealthAggregator::new(
            Some(Arc::new(StubDatabase { fail: db_fail })),
            Some(Arc::new(MemoryCache::new())),
            bot.map(|fail| Arc::new(StubBot { fail }) as Arc<dyn BotProbe>),
            recorder,
            alerts,
            performance,
            MonitorConfig::default(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn all_components_healthy_folds_to_healthy() {
        let report = aggregator(false, Some(false)).check().await;
        assert_eq!(report.status, SystemStatus::Healthy);
        assert_eq!(report.components.len(), 4);
        assert!(report.components["database"].connected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_failing_component_degrades_the_system() {
        let report = aggregator(true, Some(false)).check().await;
        assert_eq!(report.status, SystemStatus::Degraded);
        assert!(report.components["database"].is_issue());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_failing_components_make_the_system_unhealthy() {
        let report = aggregator(true, Some(true)).check().await;
        assert_eq!(report.status, SystemStatus::Unhealthy);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn issues_list_names_failing_components_and_is_absent_when_clean() {
        let report = aggregator(false, Some(false)).check().await;
        assert!(report.issues.is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("issues").is_none());

        let report = aggregator(true, Some(true)).check().await;
        assert_eq!(
            report.issues,
            Some(vec!["bot".to_string(), "database".to_string()])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_bot_counts_as_a_single_issue() {
        let report = aggregator(false, None).check().await;
        assert_eq!(report.status, SystemStatus::Degraded);
        assert_eq!(
            report.components["bot"].error.as_deref(),
            Some("not configured")
        );
    }
}

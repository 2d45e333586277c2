use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vigil::alerts::AlertEngine;
use vigil::cache::{CacheAdapter, MemoryCache};
use vigil::probes::{
    BotIdentity, BotProbe, DatabaseLiveness, DatabaseProbe, TopSurvey, UserActivitySummary,
};
use vigil::recorder::MetricRecorder;
use vigil::{
    AlertLevel, MetricKind, MonitorConfig, MonitoringService, SystemStatus, Thresholds,
};

struct FakeDatabase {
    users: u64,
}

#[async_trait]
impl DatabaseProbe for FakeDatabase {
    async fn liveness(&self) -> Result<DatabaseLiveness> {
        Ok(DatabaseLiveness {
            total_users: self.users,
        })
    }

    async fn user_analytics(&self, _since: DateTime<Utc>) -> Result<UserActivitySummary> {
        Ok(UserActivitySummary {
            new_registrations: 2,
            active_users: self.users,
            survey_completions: 6,
            top_surveys: vec![TopSurvey {
                title: "Onboarding".to_string(),
                responses: 5,
            }],
        })
    }
}

struct FakeBot;

#[async_trait]
impl BotProbe for FakeBot {
    async fn identity(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            username: "surveybot".to_string(),
        })
    }
}

fn service_with_cache() -> (MonitoringService, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let service = MonitoringService::builder()
        .config(MonitorConfig::default())
        .cache(cache.clone())
        .database(Arc::new(FakeDatabase { users: 4 }))
        .bot(Arc::new(FakeBot))
        .build();
    (service, cache)
}

#[tokio::test]
async fn sustained_load_trims_history_to_the_retention_floor() {
    let alerts = Arc::new(AlertEngine::new(Thresholds::default(), None));
    let recorder = MetricRecorder::new(None, alerts);

    for i in 0..=10_000u32 {
        recorder
            .record_value("load_test", f64::from(i), MetricKind::Counter, HashMap::new())
            .await;
    }

    assert_eq!(recorder.len().await, 8_000);
    let (first, last) = recorder.first_last("load_test").await.unwrap();
    assert_eq!(first, 2001.0);
    assert_eq!(last, 10_000.0);
}

#[tokio::test]
async fn threshold_breach_raises_one_alert_and_stays_deduplicated() {
    let (service, _cache) = service_with_cache();

    service
        .record_metric("response_time_ms", 500.0, MetricKind::Timer, HashMap::new())
        .await;
    assert!(service.active_alerts().await.is_empty());

    service
        .record_metric("response_time_ms", 1500.0, MetricKind::Timer, HashMap::new())
        .await;
    service
        .record_metric("response_time_ms", 1700.0, MetricKind::Timer, HashMap::new())
        .await;

    let active = service.active_alerts().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "high_response_time");
    assert_eq!(active[0].level, AlertLevel::Warning);

    assert_eq!(service.resolve_alert("high_response_time").await, 1);
    assert!(service.active_alerts().await.is_empty());
}

#[tokio::test]
async fn performance_tracking_summarizes_and_flags_slow_operations() {
    let (service, _cache) = service_with_cache();

    for ms in [100.0, 200.0, 300.0, 400.0, 500.0] {
        service.track_performance("db_query", ms, "success").await;
    }
    let summary = service.performance_summary("db_query").unwrap();
    assert_eq!(summary.avg_ms, 300.0);
    assert_eq!(summary.min_ms, 100.0);
    assert_eq!(summary.max_ms, 500.0);
    assert_eq!(summary.count, 5);

    service
        .track_performance("report_render", 2500.0, "error")
        .await;
    let ids: Vec<String> = service
        .active_alerts()
        .await
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert!(ids.contains(&"slow_operation_report_render".to_string()));
}

#[tokio::test]
async fn recorded_metrics_are_mirrored_into_the_cache() {
    let (service, cache) = service_with_cache();

    service
        .record_metric("cpu_usage", 42.5, MetricKind::Gauge, HashMap::new())
        .await;

    let keys = cache.list_keys("metric:cpu_usage:*").await.unwrap();
    assert_eq!(keys.len(), 1);
    let fields = cache.get_hash(&keys[0]).await.unwrap();
    assert_eq!(fields["name"], "cpu_usage");
    assert_eq!(fields["value"], "42.5");
    assert_eq!(fields["type"], "gauge");
}

#[tokio::test]
async fn user_actions_feed_counters_and_the_analytics_report() {
    let (service, cache) = service_with_cache();

    service.track_user_action(7, "survey_start", None).await;
    service.track_user_action(7, "survey_start", None).await;
    service
        .track_user_action(
            9,
            "question_answer",
            Some(HashMap::from([(
                "question_id".to_string(),
                serde_json::Value::from(3),
            )])),
        )
        .await;

    assert_eq!(cache.get_counter("user_action:total").await.unwrap(), 3);
    let user = cache.get_hash("user_analytics:7").await.unwrap();
    assert_eq!(user["survey_start"], "2");
    assert_eq!(user["last_action"], "survey_start");

    let report = service.user_analytics(7).await;
    assert_eq!(report.total_actions, 3);
    assert_eq!(report.common_actions["survey_start"], 2);
    assert_eq!(report.common_actions["question_answer"], 1);
    assert_eq!(report.users.active_users, 4);
    assert_eq!(report.users.new_registrations, 2);
    assert_eq!(report.surveys.completions, 6);
    assert_eq!(report.surveys.top_surveys[0].title, "Onboarding");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_probes_every_component_concurrently() {
    let (service, _cache) = service_with_cache();

    let report = service.health_check().await;
    assert_eq!(report.status, SystemStatus::Healthy);
    assert!(report.components["database"].connected);
    assert_eq!(
        report.components["bot"].details["username"],
        serde_json::Value::from("surveybot")
    );
    assert!(report.components["application"].details["uptime_secs"].is_number());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_collaborators_degrade_health_without_failing() {
    let service = MonitoringService::builder().build();

    let report = service.health_check().await;
    assert_eq!(report.status, SystemStatus::Unhealthy);
    assert_eq!(
        report.components["database"].error.as_deref(),
        Some("not configured")
    );
    assert!(!report.components["application"].is_issue());
    assert_eq!(
        report.issues,
        Some(vec![
            "bot".to_string(),
            "cache".to_string(),
            "database".to_string()
        ])
    );
}

#[tokio::test]
async fn snapshot_reflects_recorded_activity() {
    let (service, _cache) = service_with_cache();

    for value in [10.0, 20.0, 30.0] {
        service
            .record_metric("quiz_completions", value, MetricKind::Counter, HashMap::new())
            .await;
    }
    service
        .record_metric("api_error", 1.0, MetricKind::Counter, HashMap::new())
        .await;

    let snapshot = service.real_time_snapshot().await;
    assert_eq!(snapshot.metrics_last_5min, 4);
    assert_eq!(snapshot.errors_last_hour, 1);
    assert!(snapshot.memory.host_used_percent >= 0.0);
}

#[tokio::test]
async fn custom_dashboard_is_scoped_named_and_mirrored() {
    let (service, cache) = service_with_cache();

    for value in [10.0, 20.0, 30.0] {
        service
            .record_metric("wanted_metric", value, MetricKind::Counter, HashMap::new())
            .await;
    }
    service
        .record_metric("unrelated_metric", 99.0, MetricKind::Gauge, HashMap::new())
        .await;

    let dashboard = service
        .create_custom_dashboard(
            "weekly_quizzes",
            &["wanted_metric".to_string(), "never_recorded".to_string()],
        )
        .await;

    assert_eq!(dashboard.name, "weekly_quizzes");
    assert!(!dashboard.metrics.contains_key("unrelated_metric"));
    assert!(!dashboard.metrics.contains_key("never_recorded"));
    let metric = &dashboard.metrics["wanted_metric"];
    assert_eq!(metric.current_value, 30.0);
    assert_eq!(metric.avg_24h, 20.0);
    assert_eq!(metric.data_points, 3);

    let keys = cache.list_keys("dashboard:*").await.unwrap();
    assert_eq!(keys, vec!["dashboard:weekly_quizzes".to_string()]);
}

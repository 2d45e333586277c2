use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{best_effort, CacheAdapter};
use crate::config::{Thresholds, ALERT_TTL_SECS};
use crate::types::{Alert, AlertLevel, Measurement};

/// Raises alerts when measurements breach configured thresholds and keeps
/// the in-memory alert log. At most one unresolved alert exists per alert
/// id at any time.
pub struct AlertEngine {
    alerts: RwLock<Vec<Alert>>,
    thresholds: Thresholds,
    cache: Option<Arc<dyn CacheAdapter>>,
}

struct Rule {
    id: &'static str,
    name: &'static str,
    level: AlertLevel,
    threshold: f64,
    unit: &'static str,
}

impl AlertEngine {
    pub fn new(thresholds: Thresholds, cache: Option<Arc<dyn CacheAdapter>>) -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            thresholds,
            cache,
        }
    }

    fn rule_for(&self, measurement_name: &str) -> Option<Rule> {
        match measurement_name {
            "response_time" | "response_time_ms" => Some(Rule {
                id: "high_response_time",
                name: "High Response Time",
                level: AlertLevel::Warning,
                threshold: self.thresholds.response_time_ms,
                unit: "ms",
            }),
            "error_rate" | "error_rate_percent" => Some(Rule {
                id: "high_error_rate",
                name: "High Error Rate",
                level: AlertLevel::Error,
                threshold: self.thresholds.error_rate_percent,
                unit: "%",
            }),
            "memory_usage_percent" => Some(Rule {
                id: "high_memory_usage",
                name: "High Memory Usage",
                level: AlertLevel::Critical,
                threshold: self.thresholds.memory_usage_percent,
                unit: "%",
            }),
            "active_connections" => Some(Rule {
                id: "too_many_connections",
                name: "Too Many Connections",
                level: AlertLevel::Warning,
                threshold: self.thresholds.active_connections,
                unit: "",
            }),
            _ => None,
        }
    }

    /// Compare a measurement against the rule table. Breaches are strictly
    /// greater-than; a value exactly at the threshold does not alert.
    pub async fn evaluate(&self, measurement: &Measurement) {
        let Some(rule) = self.rule_for(&measurement.name) else {
            return;
        };
        if measurement.value <= rule.threshold {
            return;
        }

        let mut metadata = HashMap::new();
        metadata.insert("metric".to_string(), Value::from(measurement.name.clone()));
        metadata.insert("value".to_string(), Value::from(measurement.value));
        metadata.insert("threshold".to_string(), Value::from(rule.threshold));

        self.create(
            rule.id,
            rule.name,
            rule.level,
            &format!(
                "{} is {}{}, above the {}{} threshold",
                measurement.name, measurement.value, rule.unit, rule.threshold, rule.unit
            ),
            metadata,
        )
        .await;
    }

    /// Raise an alert unless an unresolved one with the same id already
    /// exists. Returns the alert when a new one was raised.
    pub async fn create(
        &self,
        id: &str,
        name: &str,
        level: AlertLevel,
        message: &str,
        metadata: HashMap<String, Value>,
    ) -> Option<Alert> {
        let alert = {
            let mut alerts = self.alerts.write().await;
            if alerts.iter().any(|a| a.id == id && !a.resolved) {
                return None;
            }
            let alert = Alert::new(id, name, level, message, metadata);
            alerts.push(alert.clone());
            alert
        };

        tracing::warn!(
            alert_id = %alert.id,
            level = alert.level.as_str(),
            message = %alert.message,
            "alert raised"
        );

        if let Some(cache) = &self.cache {
            // Keyed by bare id so a re-created alert overwrites the prior
            // mirrored entry.
            let key = format!("alert:{}", alert.id);
            best_effort(
                "mirror alert",
                cache.set_hash(&key, alert.to_fields(), ALERT_TTL_SECS),
            )
            .await;
        }

        Some(alert)
    }

    /// Mark every unresolved alert with this id as resolved. Returns how
    /// many alerts were resolved.
    pub async fn resolve(&self, id: &str) -> usize {
        let mut alerts = self.alerts.write().await;
        let mut resolved = 0;
        for alert in alerts.iter_mut() {
            if alert.id == id && !alert.resolved {
                alert.resolved = true;
                resolved += 1;
            }
        }
        if resolved > 0 {
            tracing::info!(alert_id = %id, count = resolved, "alert resolved");
        }
        resolved
    }

    pub async fn active_count(&self) -> usize {
        let alerts = self.alerts.read().await;
        alerts.iter().filter(|a| !a.resolved).count()
    }

    pub async fn active(&self) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts.iter().filter(|a| !a.resolved).cloned().collect()
    }

    pub async fn snapshot(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricKind;

    fn measurement(name: &str, value: f64) -> Measurement {
        Measurement::new(name, value, MetricKind::Gauge, HashMap::new())
    }

    #[tokio::test]
    async fn value_at_threshold_does_not_alert() {
        let engine = AlertEngine::new(Thresholds::default(), None);
        engine.evaluate(&measurement("response_time_ms", 1000.0)).await;
        assert_eq!(engine.active_count().await, 0);

        engine.evaluate(&measurement("response_time_ms", 1000.1)).await;
        assert_eq!(engine.active_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_unresolved_alerts_are_suppressed() {
        let engine = AlertEngine::new(Thresholds::default(), None);
        engine.evaluate(&measurement("error_rate", 9.0)).await;
        engine.evaluate(&measurement("error_rate", 12.0)).await;
        assert_eq!(engine.active_count().await, 1);
        assert_eq!(engine.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn resolved_alerts_allow_a_new_one() {
        let engine = AlertEngine::new(Thresholds::default(), None);
        engine.evaluate(&measurement("error_rate", 9.0)).await;
        assert_eq!(engine.resolve("high_error_rate").await, 1);
        assert_eq!(engine.active_count().await, 0);

        engine.evaluate(&measurement("error_rate", 9.0)).await;
        assert_eq!(engine.active_count().await, 1);
        assert_eq!(engine.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn memory_and_connection_rules_use_their_own_ids_and_levels() {
        let engine = AlertEngine::new(Thresholds::default(), None);
        engine
            .evaluate(&measurement("memory_usage_percent", 92.0))
            .await;
        engine
            .evaluate(&measurement("active_connections", 1500.0))
            .await;
        engine.evaluate(&measurement("error_rate_percent", 7.5)).await;

        let active = engine.active().await;
        assert_eq!(active.len(), 3);
        let levels: HashMap<String, AlertLevel> =
            active.into_iter().map(|a| (a.id, a.level)).collect();
        assert_eq!(levels["high_memory_usage"], AlertLevel::Critical);
        assert_eq!(levels["too_many_connections"], AlertLevel::Warning);
        assert_eq!(levels["high_error_rate"], AlertLevel::Error);
    }

    #[tokio::test]
    async fn alert_mirror_uses_the_bare_id_as_key() {
        use crate::cache::{CacheAdapter, MemoryCache};

        let cache = std::sync::Arc::new(MemoryCache::new());
        let engine = AlertEngine::new(Thresholds::default(), Some(cache.clone()));
        engine.evaluate(&measurement("error_rate", 9.0)).await;
        engine.resolve("high_error_rate").await;
        engine.evaluate(&measurement("error_rate", 11.0)).await;

        let keys = cache.list_keys("alert:*").await.unwrap();
        assert_eq!(keys, vec!["alert:high_error_rate".to_string()]);
        let fields = cache.get_hash("alert:high_error_rate").await.unwrap();
        assert_eq!(fields["resolved"], "false");
    }

    #[tokio::test]
    async fn unknown_metric_names_never_alert() {
        let engine = AlertEngine::new(Thresholds::default(), None);
        engine.evaluate(&measurement("queue_depth", 1e9)).await;
        assert_eq!(engine.active_count().await, 0);
    }
}

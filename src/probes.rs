use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Result of a database liveness query.
#[derive(Debug, Clone, Default)]
pub struct DatabaseLiveness {
    pub total_users: u64,
}

/// One survey with its response count, for the top-surveys ranking.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TopSurvey {
    pub title: String,
    pub responses: u64,
}

/// Aggregated user activity since a cutoff, as queried from the database.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UserActivitySummary {
    pub new_registrations: u64,
    pub active_users: u64,
    pub survey_completions: u64,
    pub top_surveys: Vec<TopSurvey>,
}

/// Who the bot authenticates as.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub username: String,
}

/// Database collaborator the health aggregator probes.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Cheap query proving the database answers, returning a headline count.
    async fn liveness(&self) -> Result<DatabaseLiveness>;

    /// Registrations, active users, completions and the top surveys since
    /// `since`.
    async fn user_analytics(&self, since: DateTime<Utc>) -> Result<UserActivitySummary>;
}

/// Bot API collaborator the health aggregator probes.
#[async_trait]
pub trait BotProbe: Send + Sync {
    async fn identity(&self) -> Result<BotIdentity>;
}

#[derive(Deserialize)]
struct GetMeResponse {
    ok: bool,
    result: Option<GetMeResult>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct GetMeResult {
    username: String,
}

/// Bot probe that calls the Telegram `getMe` endpoint over HTTP.
pub struct HttpBotProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpBotProbe {
    pub fn new(token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: format!("https://api.telegram.org/bot{}/getMe", token),
        })
    }
}

#[async_trait]
impl BotProbe for HttpBotProbe {
    async fn identity(&self) -> Result<BotIdentity> {
        let response: GetMeResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            anyhow::bail!(
                "bot API refused getMe: {}",
                response.description.unwrap_or_else(|| "unknown".to_string())
            );
        }
        let result = response
            .result
            .ok_or_else(|| anyhow::anyhow!("bot API returned ok without a result"))?;
        Ok(BotIdentity {
            username: result.username,
        })
    }
}

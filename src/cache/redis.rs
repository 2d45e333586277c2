use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::{sync::Mutex, time::timeout};

use super::CacheAdapter;

pub const DEFAULT_REDIS_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed cache collaborator. Holds one multiplexed connection behind
/// a mutex; the manager reconnects on its own after transient failures.
pub struct RedisCache {
    connection: Mutex<ConnectionManager>,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = timeout(
            DEFAULT_REDIS_CONNECTION_TIMEOUT,
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Redis connection timed out after {:?}. Please ensure Redis is running at: {}",
                DEFAULT_REDIS_CONNECTION_TIMEOUT,
                redis_url
            )
        })?
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis at {}: {}", redis_url, e))?;

        Ok(Self {
            connection: Mutex::new(manager),
        })
    }
}

#[async_trait]
impl CacheAdapter for RedisCache {
    async fn set_hash(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.connection.lock().await;
        let pairs: Vec<(String, String)> = fields.into_iter().collect();
        conn.hset_multiple::<_, _, _, ()>(key, &pairs).await?;
        conn.expire::<_, ()>(key, ttl_secs as i64).await?;
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection.lock().await;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn increment_counter(&self, key: &str, ttl_secs: u64) -> Result<i64> {
        let mut conn = self.connection.lock().await;
        let value: i64 = conn.incr(key, 1).await?;
        if value == 1 {
            conn.expire::<_, ()>(key, ttl_secs as i64).await?;
        }
        Ok(value)
    }

    async fn get_counter(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection.lock().await;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock().await;
        let result: redis::RedisResult<String> =
            redis::cmd("PING").query_async(&mut *conn).await;
        result.map_err(|e| anyhow::anyhow!("Redis ping failed: {}", e))?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.lock().await;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.lock().await;
        let count: u64 = conn.scard(key).await?;
        Ok(count)
    }

    async fn stats(&self) -> Result<HashMap<String, String>> {
        let mut conn = self.connection.lock().await;
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut *conn)
            .await?;
        let clients: String = redis::cmd("INFO")
            .arg("clients")
            .query_async(&mut *conn)
            .await?;

        let mut stats = HashMap::new();
        for line in info.lines().chain(clients.lines()) {
            if let Some((name, value)) = line.split_once(':') {
                if matches!(name, "used_memory_human" | "connected_clients") {
                    stats.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
        Ok(stats)
    }
}

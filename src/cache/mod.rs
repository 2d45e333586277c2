use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// Key/value collaborator the engine mirrors telemetry into. Every call is
/// best-effort from the engine's point of view; failures are logged and
/// never propagate into the recording path.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Write a string-field hash under `key` with a TTL in seconds.
    async fn set_hash(&self, key: &str, fields: HashMap<String, String>, ttl_secs: u64)
        -> Result<()>;

    /// Read a hash previously written with `set_hash`. Missing keys return
    /// an empty map.
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Increment an integer counter under `key`, setting the TTL when the
    /// counter is first created. Returns the new value.
    async fn increment_counter(&self, key: &str, ttl_secs: u64) -> Result<i64>;

    /// Read a counter. Missing keys return zero.
    async fn get_counter(&self, key: &str) -> Result<i64>;

    /// Round-trip liveness check.
    async fn ping(&self) -> Result<()>;

    /// Whether the adapter currently holds a usable connection.
    async fn is_connected(&self) -> bool;

    /// Keys matching a glob-style pattern, e.g. `websocket:user:*`.
    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Cardinality of the set stored under `key`. Missing keys return zero.
    async fn set_cardinality(&self, key: &str) -> Result<u64>;

    /// Backend statistics for the health probe, e.g. memory usage and
    /// client counts. Backends without stats return an empty map.
    async fn stats(&self) -> Result<HashMap<String, String>>;
}

/// Run a cache operation without letting its failure escape. Used on the
/// mirror path where the in-memory record has already succeeded.
pub async fn best_effort<F, T>(what: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(operation = what, error = %error, "cache operation failed");
            None
        }
    }
}

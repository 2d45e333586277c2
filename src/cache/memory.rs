use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use super::CacheAdapter;

enum Entry {
    Hash(HashMap<String, String>),
    Counter(i64),
}

struct Slot {
    entry: Entry,
    expires_at: Instant,
}

impl Slot {
    fn live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process cache collaborator. Backs tests and deployments that run
/// without Redis; entries honor TTLs but are only reaped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    slots: DashMap<String, Slot>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: &str, entry: Entry, ttl_secs: u64) {
        self.slots.insert(
            key.to_string(),
            Slot {
                entry,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
    }
}

#[async_trait]
impl CacheAdapter for MemoryCache {
    async fn set_hash(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl_secs: u64,
    ) -> Result<()> {
        self.insert(key, Entry::Hash(fields), ttl_secs);
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.slots.get(key) {
            Some(slot) if slot.live() => match &slot.entry {
                Entry::Hash(fields) => Ok(fields.clone()),
                Entry::Counter(_) => Ok(HashMap::new()),
            },
            _ => Ok(HashMap::new()),
        }
    }

    async fn increment_counter(&self, key: &str, ttl_secs: u64) -> Result<i64> {
        let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            entry: Entry::Counter(0),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        });
        if !slot.live() {
            slot.entry = Entry::Counter(0);
            slot.expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        }
        match &mut slot.entry {
            Entry::Counter(value) => {
                *value += 1;
                Ok(*value)
            }
            Entry::Hash(_) => Err(anyhow::anyhow!("key {} holds a hash, not a counter", key)),
        }
    }

    async fn get_counter(&self, key: &str) -> Result<i64> {
        match self.slots.get(key) {
            Some(slot) if slot.live() => match &slot.entry {
                Entry::Counter(value) => Ok(*value),
                Entry::Hash(_) => Ok(0),
            },
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys = self
            .slots
            .iter()
            .filter(|slot| slot.value().live() && glob_match(pattern, slot.key()))
            .map(|slot| slot.key().clone())
            .collect();
        Ok(keys)
    }

    async fn set_cardinality(&self, _key: &str) -> Result<u64> {
        // Sets are not modelled in the in-process backend.
        Ok(0)
    }

    async fn stats(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }
}

/// Glob matching restricted to `*`, which is all the engine's key
/// patterns use.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_increment_and_read_back() {
        let cache = MemoryCache::new();
        assert_eq!(cache.increment_counter("hits", 60).await.unwrap(), 1);
        assert_eq!(cache.increment_counter("hits", 60).await.unwrap(), 2);
        assert_eq!(cache.get_counter("hits").await.unwrap(), 2);
        assert_eq!(cache.get_counter("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hashes_round_trip_and_missing_keys_are_empty() {
        let cache = MemoryCache::new();
        let mut fields = HashMap::new();
        fields.insert("value".to_string(), "42".to_string());
        cache.set_hash("metric:cpu:1", fields.clone(), 60).await.unwrap();
        assert_eq!(cache.get_hash("metric:cpu:1").await.unwrap(), fields);
        assert!(cache.get_hash("metric:cpu:2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn key_patterns_match_prefix_globs() {
        let cache = MemoryCache::new();
        cache
            .set_hash("websocket:user:7", HashMap::new(), 60)
            .await
            .unwrap();
        cache
            .set_hash("metric:cpu:1", HashMap::new(), 60)
            .await
            .unwrap();
        let keys = cache.list_keys("websocket:user:*").await.unwrap();
        assert_eq!(keys, vec!["websocket:user:7".to_string()]);
    }

    #[test]
    fn glob_handles_literal_and_infix_patterns() {
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("metric:*:5", "metric:cpu:5"));
        assert!(!glob_match("metric:*:5", "metric:cpu:6"));
    }
}

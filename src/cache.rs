//! TTL cache of normalized upstream payloads.
//!
//! Keys combine the normalized upstream URL with the resolved identity (or
//! the `public` sentinel), so a response produced under one user's bearer
//! token can never be served to a different user or to an anonymous caller.
//! Expiry is lazy: stale entries are ignored on read and overwritten on the
//! next fill; nothing sweeps the map.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

/// Cache-partition sentinel for requests with no resolved identity.
pub const PUBLIC_PARTITION: &str = "public";

struct CacheEntry {
    payload: Value,
    expires_at: Instant,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Deterministic cache key: `url + "::user:" + partition`.
    pub fn key(url: &str, partition: &str) -> String {
        format!("{url}::user:{partition}")
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.payload.clone())
    }

    /// Unconditional overwrite; the last writer wins.
    pub async fn put(&self, key: String, payload: Value, ttl: Duration) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn entries_are_partitioned_by_identity() {
        let cache = ResponseCache::default();
        let url = "https://api.mercadolibre.com/sites/MLB/search?q=freio";

        cache
            .put(ResponseCache::key(url, "user-a"), json!({"who": "a"}), TTL)
            .await;

        assert_eq!(
            cache.get(&ResponseCache::key(url, "user-a")).await,
            Some(json!({"who": "a"}))
        );
        assert_eq!(cache.get(&ResponseCache::key(url, "user-b")).await, None);
        assert_eq!(
            cache.get(&ResponseCache::key(url, PUBLIC_PARTITION)).await,
            None
        );
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = ResponseCache::default();
        let key = ResponseCache::key("u", PUBLIC_PARTITION);

        cache
            .put(key.clone(), json!(1), Duration::from_millis(10))
            .await;
        assert_eq!(cache.get(&key).await, Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn writes_overwrite_unconditionally() {
        let cache = ResponseCache::default();
        let key = ResponseCache::key("u", "user-a");

        cache.put(key.clone(), json!("old"), TTL).await;
        cache.put(key.clone(), json!("new"), TTL).await;

        assert_eq!(cache.get(&key).await, Some(json!("new")));
    }
}

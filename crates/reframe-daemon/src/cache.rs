use hyper::body::Bytes;
use hyper::header::HeaderMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Method-scoped cache key. Only GET responses are ever stored, but the
/// method stays part of the key so a future cacheable method cannot
/// collide with existing entries. `Url` serialization already lowercases
/// scheme and host while leaving path/query case intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: &'static str,
    url: String,
}

impl CacheKey {
    pub fn for_get(url: &url::Url) -> Self {
        Self {
            method: "GET",
            url: url.as_str().to_string(),
        }
    }
}

/// What a hit replays: sanitized headers and the already-rewritten body.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded, time-expiring store of rewritten GET responses. Entries are
/// replaced whole, never mutated; eviction drops the least-recently-used
/// key first.
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    max_entries: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            ttl,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired() {
                entries.remove(key);
                return None;
            }
            entry.last_accessed = Instant::now();
            return Some(entry.response.clone());
        }
        None
    }

    pub async fn put(&self, key: CacheKey, response: CachedResponse) {
        if self.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().await;

        // Replacing an existing key never needs room.
        while entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let lru = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            match lru {
                Some(k) => {
                    entries.remove(&k);
                    debug!("Evicted cache entry for {}", k.url);
                }
                None => break,
            }
        }

        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                response,
                expires_at: now + self.ttl,
                last_accessed: now,
            },
        );
    }

    pub async fn cleanup_expired(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Dropped {} expired cache entries", removed);
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let total_bytes: usize = entries.values().map(|e| e.response.body.len()).sum();
        CacheStats {
            entry_count: entries.len(),
            max_entries: self.max_entries,
            total_bytes,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub max_entries: usize,
    pub total_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn key(url: &str) -> CacheKey {
        CacheKey::for_get(&url::Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_get_after_put() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put(key("https://example.com/"), response("hello")).await;

        let hit = cache.get(&key("https://example.com/")).await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        assert!(cache.get(&key("https://example.com/")).await.is_none());
    }

    #[tokio::test]
    async fn test_key_distinguishes_query() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put(key("https://example.com/?a=1"), response("one")).await;

        assert!(cache.get(&key("https://example.com/?a=2")).await.is_none());
        assert!(cache.get(&key("https://example.com/?a=1")).await.is_some());
    }

    #[tokio::test]
    async fn test_key_case_insensitive_host() {
        // Url::parse lowercases the host, so both spellings share a key.
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put(key("https://EXAMPLE.com/Path"), response("x")).await;
        assert!(cache.get(&key("https://example.com/Path")).await.is_some());
        // Path case stays significant.
        assert!(cache.get(&key("https://example.com/path")).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new(10, Duration::from_millis(10));
        cache.put(key("https://example.com/"), response("stale")).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&key("https://example.com/")).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bound_holds() {
        let cache = ResponseCache::new(3, Duration::from_secs(60));
        for i in 0..10 {
            cache
                .put(key(&format!("https://example.com/{}", i)), response("x"))
                .await;
        }
        assert_eq!(cache.stats().await.entry_count, 3);
    }

    #[tokio::test]
    async fn test_lru_eviction_order() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put(key("https://example.com/a"), response("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(key("https://example.com/b"), response("b")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Touch /a so /b becomes the eviction candidate.
        cache.get(&key("https://example.com/a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(key("https://example.com/c"), response("c")).await;

        assert!(cache.get(&key("https://example.com/a")).await.is_some());
        assert!(cache.get(&key("https://example.com/b")).await.is_none());
        assert!(cache.get(&key("https://example.com/c")).await.is_some());
    }

    #[tokio::test]
    async fn test_replace_does_not_evict() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put(key("https://example.com/a"), response("a1")).await;
        cache.put(key("https://example.com/b"), response("b")).await;
        cache.put(key("https://example.com/a"), response("a2")).await;

        assert_eq!(
            cache.get(&key("https://example.com/a")).await.unwrap().body,
            Bytes::from("a2")
        );
        assert!(cache.get(&key("https://example.com/b")).await.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = ResponseCache::new(10, Duration::from_millis(10));
        cache.put(key("https://example.com/a"), response("a")).await;
        cache.put(key("https://example.com/b"), response("b")).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.cleanup_expired().await;
        assert_eq!(cache.stats().await.entry_count, 0);
    }
}

// Fetch cache: hashed (subject, kind, params) keys mapped to timestamped JSON

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// What a cached blob holds. Decides how long it stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    PageSpeed,
    Performance,
    Crawl,
    PageText,
    Search,
}

impl CacheKind {
    pub const ALL: [CacheKind; 5] = [
        CacheKind::PageSpeed,
        CacheKind::Performance,
        CacheKind::Crawl,
        CacheKind::PageText,
        CacheKind::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::PageSpeed => "pagespeed",
            CacheKind::Performance => "performance",
            CacheKind::Crawl => "crawl",
            CacheKind::PageText => "page_text",
            CacheKind::Search => "search",
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        match self {
            CacheKind::PageSpeed => 3600,
            CacheKind::Performance | CacheKind::Crawl | CacheKind::PageText => 24 * 3600,
            CacheKind::Search => 48 * 3600,
        }
    }

    pub fn is_fresh(&self, fetched_at: i64, now: i64) -> bool {
        now - fetched_at < self.ttl_secs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub digest: String,
    pub kind: CacheKind,
    pub subject: String,
}

impl CacheKey {
    pub fn new(subject: &str, kind: CacheKind, params: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subject.as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(params.as_bytes());

        Self {
            digest: format!("{:x}", hasher.finalize()),
            kind,
            subject: subject.to_string(),
        }
    }
}

/// Key/value store behind every provider call.
///
/// Implementations swallow their own failures: a broken store behaves
/// like an empty one.
pub trait Cache: Send + Sync {
    /// A fresh entry for the key, honoring the kind's TTL.
    fn get(&self, key: &CacheKey) -> Option<Value>;

    /// Overwrites the entry and stamps it with the current time.
    fn put(&self, key: &CacheKey, value: &Value);
}

pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Process-local cache, used when no sqlite file is wanted and in tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (i64, Value)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_at(&self, key: &CacheKey, value: &Value, fetched_at: i64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.digest.clone(), (fetched_at, value.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key.digest)
            .filter(|(fetched_at, _)| key.kind.is_fresh(*fetched_at, current_timestamp()))
            .map(|(_, value)| value.clone())
    }

    fn put(&self, key: &CacheKey, value: &Value) {
        self.put_at(key, value, current_timestamp());
    }
}

/// Read-through wrapper the analysis modules fetch with.
#[derive(Clone)]
pub struct FetchCache {
    store: Arc<dyn Cache>,
    refresh: bool,
}

impl FetchCache {
    pub fn new(store: Arc<dyn Cache>, refresh: bool) -> Self {
        Self { store, refresh }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), false)
    }

    pub fn store(&self) -> &Arc<dyn Cache> {
        &self.store
    }

    /// Returns the cached value for `key`, or runs `fetch` and stores its
    /// successful result. Errors are never cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.refresh
            && let Some(cached) = self.store.get(key)
        {
            match serde_json::from_value(cached) {
                Ok(value) => {
                    debug!("Cache hit: {} {}", key.kind.as_str(), key.subject);
                    return Ok(value);
                }
                Err(e) => warn!("Discarding unreadable cache entry for {}: {}", key.subject, e),
            }
        }

        let value = fetch().await?;
        match serde_json::to_value(&value) {
            Ok(json) => self.store.put(key, &json),
            Err(e) => warn!("Could not serialize {} for cache: {}", key.subject, e),
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_depends_on_every_component() {
        let base = CacheKey::new("example.com", CacheKind::Performance, "page:30d");
        assert_eq!(base.digest.len(), 64);
        assert_eq!(base, CacheKey::new("example.com", CacheKind::Performance, "page:30d"));
        assert_ne!(base.digest, CacheKey::new("example.org", CacheKind::Performance, "page:30d").digest);
        assert_ne!(base.digest, CacheKey::new("example.com", CacheKind::Search, "page:30d").digest);
        assert_ne!(base.digest, CacheKey::new("example.com", CacheKind::Performance, "query:30d").digest);
    }

    #[test]
    fn test_ttls() {
        assert_eq!(CacheKind::PageSpeed.ttl_secs(), 3600);
        assert_eq!(CacheKind::Performance.ttl_secs(), 86400);
        assert_eq!(CacheKind::Search.ttl_secs(), 172800);
        assert!(CacheKind::PageSpeed.is_fresh(1000, 1000 + 3599));
        assert!(!CacheKind::PageSpeed.is_fresh(1000, 1000 + 3600));
    }

    #[test]
    fn test_memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("example.com", CacheKind::PageSpeed, "mobile");
        cache.put_at(&key, &json!({"score": 90}), current_timestamp() - 7200);
        assert!(cache.get(&key).is_none());

        cache.put(&key, &json!({"score": 91}));
        assert_eq!(cache.get(&key), Some(json!({"score": 91})));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_only_fetches_once() {
        let cache = FetchCache::in_memory();
        let key = CacheKey::new("example.com", CacheKind::Search, "q");

        let first: Result<Vec<String>, String> = cache
            .get_or_fetch(&key, || async { Ok(vec!["a".to_string()]) })
            .await;
        assert_eq!(first.unwrap(), vec!["a"]);

        let second: Result<Vec<String>, String> = cache
            .get_or_fetch(&key, || async { Err("network touched".to_string()) })
            .await;
        assert_eq!(second.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached_and_refresh_bypasses_reads() {
        let store: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let key = CacheKey::new("example.com", CacheKind::Crawl, "60");

        let cache = FetchCache::new(store.clone(), false);
        let failed: Result<u32, String> = cache.get_or_fetch(&key, || async { Err("boom".to_string()) }).await;
        assert!(failed.is_err());
        assert!(store.get(&key).is_none());

        store.put(&key, &json!(1));
        let refreshing = FetchCache::new(store.clone(), true);
        let value: Result<u32, String> = refreshing.get_or_fetch(&key, || async { Ok(2) }).await;
        assert_eq!(value.unwrap(), 2);
        assert_eq!(store.get(&key), Some(json!(2)));
    }
}

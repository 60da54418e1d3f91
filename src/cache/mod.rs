//! Caching of tool responses
//!
//! Successful tool responses are cached per engine, tool and arguments.
//! Failures are never cached.

use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;

/// Cache for serialized tool responses
#[derive(Clone)]
pub struct ResultCache {
    cache: Cache<String, String>,
}

impl ResultCache {
    /// Create a new result cache with specified TTL
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    /// Get a cached response
    pub async fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).await
    }

    /// Store a response
    pub async fn set(&self, key: String, value: String) {
        self.cache.insert(key, value).await;
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of entries
    pub fn size(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(300, 1000)
    }
}

/// Generate a cache key for a tool call
///
/// Object keys serialize in sorted order, so argument order does not matter.
pub fn tool_cache_key(engine: &str, tool: &str, arguments: &Value) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(engine.as_bytes());
    hasher.update([0]);
    hasher.update(tool.as_bytes());
    hasher.update([0]);
    hasher.update(arguments.to_string().as_bytes());

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_result_cache() {
        let cache = ResultCache::new(60, 100);
        cache.set("test".to_string(), "{}".to_string()).await;

        assert_eq!(cache.get("test").await.as_deref(), Some("{}"));
        assert!(cache.get("missing").await.is_none());

        cache.clear();
        assert!(cache.get("test").await.is_none());
    }

    #[test]
    fn test_tool_cache_key() {
        let a = tool_cache_key("serper", "web_search", &json!({"query": "rust", "num_results": 5}));
        let b = tool_cache_key("serper", "web_search", &json!({"num_results": 5, "query": "rust"}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other_tool = tool_cache_key("serper", "news_search", &json!({"query": "rust", "num_results": 5}));
        let other_engine = tool_cache_key("serpapi", "web_search", &json!({"query": "rust", "num_results": 5}));
        assert_ne!(a, other_tool);
        assert_ne!(a, other_engine);
    }
}

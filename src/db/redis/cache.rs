use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use std::time::Duration;

use crate::db::RecommendationCache;
use crate::error::AppError;
use crate::error::AppResult;
use crate::models::RecommendationResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Recommendations(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendations(user_id) => write!(f, "reco:{}", user_id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Recommendation cache shared by every replica through Redis
///
/// Entries expire after `ttl`; eviction under memory pressure is left to the
/// server's `maxmemory-policy`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisCache {
    /// Creates a cache over a managed, auto-reconnecting connection
    pub async fn new(redis_client: Client, ttl: Duration) -> AppResult<Self> {
        let conn = ConnectionManager::new(redis_client).await?;
        Ok(Self { conn, ttl })
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` when the key does not exist.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Serializes and stores a value with the configured TTL
    pub async fn set_in_cache<T: serde::Serialize>(&self, key: &CacheKey, value: &T) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;

        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key.to_string(), json, self.ttl.as_secs().max(1)).await?;
        Ok(())
    }
}

#[async_trait]
impl RecommendationCache for RedisCache {
    async fn get(&self, user_id: &str) -> AppResult<Option<RecommendationResult>> {
        self.get_from_cache(&CacheKey::Recommendations(user_id.to_string()))
            .await
    }

    async fn put(&self, user_id: &str, result: RecommendationResult) -> AppResult<()> {
        self.set_in_cache(&CacheKey::Recommendations(user_id.to_string()), &result)
            .await
    }

    async fn invalidate(&self, user_id: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(CacheKey::Recommendations(user_id.to_string()).to_string())
            .await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_recommendations() {
        let key = CacheKey::Recommendations("65f1c0ffee0000000000abcd".to_string());
        assert_eq!(format!("{}", key), "reco:65f1c0ffee0000000000abcd");
    }

    #[test]
    fn test_cache_key_keeps_case() {
        let key = CacheKey::Recommendations("User-A".to_string());
        assert_eq!(format!("{}", key), "reco:User-A");
    }

    async fn redis_cache() -> RedisCache {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        RedisCache::new(client, Duration::from_secs(60)).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_cache_miss() {
        let cache = redis_cache().await;
        let retrieved = cache.get("nonexistent_user_12345").await.unwrap();
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_put_get_invalidate() {
        let cache = redis_cache().await;
        let result = RecommendationResult::new("redis_test_user", None);

        cache.put("redis_test_user", result.clone()).await.unwrap();
        assert_eq!(cache.get("redis_test_user").await.unwrap(), Some(result));

        assert!(cache.invalidate("redis_test_user").await.unwrap());
        assert_eq!(cache.get("redis_test_user").await.unwrap(), None);
    }
}

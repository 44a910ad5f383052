use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::db::RecommendationCache;
use crate::error::AppResult;
use crate::models::RecommendationResult;

struct Slot {
    value: RecommendationResult,
    stored_at: Instant,
    tick: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Slot>,
    /// tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl LruState {
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        if let Some(slot) = self.entries.get_mut(key) {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            self.recency.insert(tick, key.to_string());
            self.next_tick += 1;
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(slot) => {
                self.recency.remove(&slot.tick);
                true
            }
            None => false,
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
        }
    }
}

/// Process-local recommendation cache bounded by TTL and entry count
///
/// Expired entries are dropped on read; the least recently used entry is
/// evicted when an insert would exceed `capacity`.
pub struct MemoryCache {
    state: Mutex<LruState>,
    ttl: Duration,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecommendationCache for MemoryCache {
    async fn get(&self, user_id: &str) -> AppResult<Option<RecommendationResult>> {
        let mut state = self.state.lock().await;

        let expired = match state.entries.get(user_id) {
            Some(slot) => slot.stored_at.elapsed() >= self.ttl,
            None => return Ok(None),
        };

        if expired {
            state.remove(user_id);
            tracing::debug!(user_id = %user_id, "Cached recommendation expired");
            return Ok(None);
        }

        state.touch(user_id);
        Ok(state.entries.get(user_id).map(|slot| slot.value.clone()))
    }

    async fn put(&self, user_id: &str, result: RecommendationResult) -> AppResult<()> {
        let mut state = self.state.lock().await;

        state.remove(user_id);
        while state.entries.len() >= self.capacity {
            state.evict_oldest();
        }

        let tick = state.next_tick;
        state.next_tick += 1;
        state.recency.insert(tick, user_id.to_string());
        state.entries.insert(
            user_id.to_string(),
            Slot {
                value: result,
                stored_at: Instant::now(),
                tick,
            },
        );

        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.state.lock().await.remove(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn result_for(user_id: &str) -> RecommendationResult {
        RecommendationResult::new(user_id, None)
    }

    #[tokio::test]
    async fn test_get_after_put() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        cache.put("u1", result_for("u1")).await.unwrap();

        let cached = cache.get("u1").await.unwrap();
        assert_eq!(cached, Some(result_for("u1")));
        assert_eq!(cache.get("u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCache::new(Duration::from_millis(30), 10);
        cache.put("u1", result_for("u1")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("u1").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = MemoryCache::new(Duration::from_secs(60), 2);
        cache.put("u1", result_for("u1")).await.unwrap();
        cache.put("u2", result_for("u2")).await.unwrap();

        // u1 becomes most recently used, so u2 is the eviction victim
        assert!(cache.get("u1").await.unwrap().is_some());
        cache.put("u3", result_for("u3")).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("u1").await.unwrap().is_some());
        assert!(cache.get("u2").await.unwrap().is_none());
        assert!(cache.get("u3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_writes_keep_one_entry() {
        let cache = MemoryCache::new(Duration::from_secs(60), 2);
        cache.put("u1", result_for("u1")).await.unwrap();
        cache.put("u1", result_for("u1")).await.unwrap();
        cache.put("u2", result_for("u2")).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        cache.put("u1", result_for("u1")).await.unwrap();

        assert!(cache.invalidate("u1").await.unwrap());
        assert!(!cache.invalidate("u1").await.unwrap());
        assert_eq!(cache.get("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_puts_and_gets() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60), 1000));
        let mut tasks = Vec::new();

        for i in 0..50 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("user-{}", i % 10);
                cache.put(&key, result_for(&key)).await.unwrap();
                cache.get(&key).await.unwrap()
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(cache.len().await, 10);
    }
}

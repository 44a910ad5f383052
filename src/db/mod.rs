pub mod cache;
pub mod history;
pub mod memory;
pub mod mongo;
pub mod redis;

pub use cache::RecommendationCache;
pub use history::HistoryStore;
pub use memory::MemoryCache;
pub use mongo::{create_mongo_client, MongoHistoryStore};
pub use self::redis::{create_redis_client, RedisCache};

#[cfg(test)]
pub use cache::MockRecommendationCache;
#[cfg(test)]
pub use history::MockHistoryStore;

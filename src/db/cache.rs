use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::RecommendationResult;

/// Memoizes recommendation results per user
///
/// Writes are last-write-wins; concurrent pipelines for the same user store the
/// same logical value, so no read-modify-write is needed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommendationCache: Send + Sync {
    async fn get(&self, user_id: &str) -> AppResult<Option<RecommendationResult>>;

    async fn put(&self, user_id: &str, result: RecommendationResult) -> AppResult<()>;

    /// Drops the cached result, returning whether one existed
    async fn invalidate(&self, user_id: &str) -> AppResult<bool>;
}

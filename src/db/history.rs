use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{HistoryRecord, UserId};

/// Read access to a user's interview history
///
/// Implementations return records in store order and an empty vector when the
/// user has none; only connectivity or query failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn fetch(&self, user_id: &UserId) -> AppResult<Vec<HistoryRecord>>;
}

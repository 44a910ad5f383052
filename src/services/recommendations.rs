use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::{HistoryStore, RecommendationCache},
    error::{AppError, AppResult},
    models::{CatalogEntry, HistoryRecord, RecommendationResult, UserId},
    services::providers::{EmbeddingProvider, VectorSearchProvider},
};

/// Tunables for one replica's pipeline
#[derive(Debug, Clone)]
pub struct RecommendationSettings {
    /// Projects returned per user
    pub top_k: usize,
    /// Search fetches `top_k * candidate_pool_multiplier` hits so filtering has room
    pub candidate_pool_multiplier: usize,
    /// Approximate-search candidates per shard
    pub num_candidates: usize,
    /// Bound on each downstream call
    pub call_timeout: Duration,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            top_k: 1,
            candidate_pool_multiplier: 6,
            num_candidates: 100,
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for RecommendationSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.default_top_k,
            candidate_pool_multiplier: config.candidate_pool_multiplier,
            num_candidates: config.es_num_candidates,
            call_timeout: config.request_timeout(),
        }
    }
}

impl RecommendationSettings {
    /// Number of hits requested from the vector index
    pub fn candidate_pool(&self) -> usize {
        self.top_k
            .saturating_mul(self.candidate_pool_multiplier)
            .max(self.top_k)
    }
}

/// Generates project recommendations from a user's interview history
///
/// Pipeline per request:
/// 1. Return the cached result if there is one
/// 2. Fetch the user's history records
/// 3. Join their transcripts, one per line
/// 4. Embed the joined text
/// 5. kNN search with an over-fetched candidate pool
/// 6. Drop projects the user already interviewed for and keep the top k
/// 7. Cache and return the result
///
/// Any downstream failure or timeout aborts the run and nothing is cached.
/// No lock is held while a downstream call is in flight.
pub struct RecommendationService {
    history: Arc<dyn HistoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn VectorSearchProvider>,
    cache: Arc<dyn RecommendationCache>,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn VectorSearchProvider>,
        cache: Arc<dyn RecommendationCache>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            history,
            embedder,
            search,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    pub async fn recommend(&self, user_id: &UserId) -> AppResult<RecommendationResult> {
        let key = user_id.key();

        if let Some(cached) = self.bounded("cache get", self.cache.get(&key)).await? {
            tracing::debug!(user_id = %key, "Recommendation cache hit");
            return Ok(cached);
        }

        tracing::debug!(user_id = %key, "Recommendation cache miss");

        let history = self
            .bounded("history fetch", self.history.fetch(user_id))
            .await?;

        let text = aggregate_transcripts(&history);

        let vector = self.bounded("embedding", self.embedder.embed(&text)).await?;

        let pool = self.settings.candidate_pool();
        let num_candidates = self.settings.num_candidates.max(pool);
        let hits = self
            .bounded(
                "vector search",
                self.search.search(&vector, pool, num_candidates),
            )
            .await?;

        let hit_count = hits.len();
        let projects = filter_seen(hits, &history, self.settings.top_k);

        tracing::info!(
            user_id = %key,
            history_records = history.len(),
            hits = hit_count,
            recommended = projects.as_ref().map_or(0, Vec::len),
            "Recommendations computed"
        );

        let result = RecommendationResult::new(key.clone(), projects);
        self.bounded("cache put", self.cache.put(&key, result.clone()))
            .await?;

        Ok(result)
    }

    /// Evicts the cached result so the next request recomputes it
    pub async fn invalidate(&self, user_id: &UserId) -> AppResult<bool> {
        let key = user_id.key();
        let removed = self
            .bounded("cache invalidate", self.cache.invalidate(&key))
            .await?;
        tracing::info!(user_id = %key, removed, "Recommendation cache invalidated");
        Ok(removed)
    }

    async fn bounded<T, F>(&self, stage: &'static str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    stage,
                    timeout_ms = self.settings.call_timeout.as_millis() as u64,
                    "Downstream call timed out"
                );
                Err(AppError::Timeout(format!(
                    "{} exceeded {}ms",
                    stage,
                    self.settings.call_timeout.as_millis()
                )))
            }
        }
    }
}

/// Joins transcripts one per line in store order
pub fn aggregate_transcripts(history: &[HistoryRecord]) -> String {
    history
        .iter()
        .map(|record| record.transcript.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes already-seen projects and keeps at most `top_k` hits.
///
/// Returns `None` rather than an empty list when nothing is left.
pub fn filter_seen(
    hits: Vec<CatalogEntry>,
    history: &[HistoryRecord],
    top_k: usize,
) -> Option<Vec<CatalogEntry>> {
    let seen: HashSet<&str> = history
        .iter()
        .map(|record| record.project_id.as_str())
        .collect();

    let fresh: Vec<CatalogEntry> = hits
        .into_iter()
        .filter(|hit| !seen.contains(hit.id.as_str()))
        .take(top_k)
        .collect();

    if fresh.is_empty() {
        None
    } else {
        Some(fresh)
    }
}

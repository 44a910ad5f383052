/// External model and index providers
///
/// The recommendation pipeline talks to an embedding model and a vector index
/// only through these traits, so either side can be swapped (or faked in tests)
/// without touching the orchestration code.
use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{CatalogEntry, Embedding},
};

pub mod elasticsearch;
pub mod huggingface;

pub use elasticsearch::ElasticsearchProvider;
pub use huggingface::HuggingFaceProvider;

/// Maps text onto a fixed-length vector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds `text`; empty input is valid and yields the model's default vector
    async fn embed(&self, text: &str) -> AppResult<Embedding>;
}

/// k-nearest-neighbor search over the project catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    /// Returns at most `k` entries ordered by descending score.
    ///
    /// `num_candidates` is the approximate-search candidate pool and is never
    /// smaller than `k`.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        num_candidates: usize,
    ) -> AppResult<Vec<CatalogEntry>>;
}

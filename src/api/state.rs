use std::sync::Arc;

use crate::config::{CacheBackend, Config};
use crate::db::{
    create_mongo_client, create_redis_client, MemoryCache, MongoHistoryStore, RecommendationCache,
    RedisCache,
};
use crate::models::UserIdFormat;
use crate::services::providers::{ElasticsearchProvider, HuggingFaceProvider};
use crate::services::{RecommendationService, RecommendationSettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: Arc<RecommendationService>,
    pub user_id_format: UserIdFormat,
}

impl AppState {
    pub fn new(recommendations: Arc<RecommendationService>, user_id_format: UserIdFormat) -> Self {
        Self {
            recommendations,
            user_id_format,
        }
    }

    /// Wires the pipeline's clients from configuration
    ///
    /// Fails when the configured embedding dimensionality disagrees with the
    /// index mapping; an unreachable index is only logged, since the mapping
    /// check is repeated implicitly by every search.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mongo = create_mongo_client(&config.mongo_uri).await?;
        let history = MongoHistoryStore::new(&mongo, &config.mongo_db, &config.mongo_collection);

        let embedder = HuggingFaceProvider::new(
            config.hf_api_url.clone(),
            config.hf_api_token.clone(),
            config.hf_embed_model.clone(),
            config.embedding_dim,
            config.embed_max_chars,
        );

        let search = ElasticsearchProvider::new(
            config.es_url.clone(),
            config.es_index.clone(),
            config.es_embedding_field.clone(),
            config.es_api_key.clone(),
        );

        if let Some(expected) = config.embedding_dim {
            match search.mapped_dimension().await {
                Ok(Some(mapped)) if mapped != expected => {
                    anyhow::bail!(
                        "EMBEDDING_DIM is {} but index '{}' maps '{}' with {} dims",
                        expected,
                        config.es_index,
                        config.es_embedding_field,
                        mapped
                    );
                }
                Ok(Some(_)) => tracing::info!(dims = expected, "Embedding dimensionality verified"),
                Ok(None) => tracing::warn!(
                    index = %config.es_index,
                    "Index mapping declares no dims for the embedding field"
                ),
                Err(e) => tracing::warn!(error = %e, "Could not verify index mapping at startup"),
            }
        }

        let cache: Arc<dyn RecommendationCache> = match config.cache_backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new(
                config.cache_ttl(),
                config.cache_max_entries,
            )),
            CacheBackend::Redis => {
                let client = create_redis_client(&config.redis_url)?;
                Arc::new(RedisCache::new(client, config.cache_ttl()).await?)
            }
        };

        tracing::info!(
            cache_backend = ?config.cache_backend,
            top_k = config.default_top_k,
            candidate_pool_multiplier = config.candidate_pool_multiplier,
            "Recommendation pipeline configured"
        );

        let service = RecommendationService::new(
            Arc::new(history),
            Arc::new(embedder),
            Arc::new(search),
            cache,
            RecommendationSettings::from(config),
        );

        Ok(Self::new(Arc::new(service), config.user_id_format))
    }
}

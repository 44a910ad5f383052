/// Elasticsearch kNN provider
///
/// Runs approximate kNN against a `dense_vector` field of the project index and
/// returns hits with the vector itself stripped from `_source`.
use crate::{
    error::{AppError, AppResult},
    models::CatalogEntry,
    services::providers::VectorSearchProvider,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

#[derive(Clone)]
pub struct ElasticsearchProvider {
    http_client: HttpClient,
    base_url: String,
    index: String,
    embedding_field: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

impl From<Hit> for CatalogEntry {
    fn from(hit: Hit) -> Self {
        CatalogEntry {
            id: hit.id,
            score: hit.score.unwrap_or_default(),
            source: hit.source,
        }
    }
}

impl ElasticsearchProvider {
    pub fn new(
        base_url: String,
        index: String,
        embedding_field: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
            index,
            embedding_field,
            api_key,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.index,
            suffix
        )
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("ApiKey {}", key)),
            None => request,
        }
    }

    /// Request body for a kNN query that excludes the vector from results
    fn knn_body(&self, vector: &[f32], k: usize, num_candidates: usize) -> Value {
        json!({
            "knn": {
                "field": self.embedding_field,
                "query_vector": vector,
                "k": k,
                "num_candidates": num_candidates.max(k),
            },
            "size": k,
            "_source": { "excludes": [self.embedding_field] },
        })
    }

    /// Reads the `dims` of the embedding field from the index mapping
    ///
    /// Returns `None` when the mapping does not declare dimensions.
    pub async fn mapped_dimension(&self) -> AppResult<Option<usize>> {
        let response = self
            .with_auth(self.http_client.get(self.url("_mapping")))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Elasticsearch mapping request returned status {}: {}",
                status, body
            )));
        }

        let mapping: Value = response.json().await?;
        Ok(Self::dims_from_mapping(&mapping, &self.index, &self.embedding_field))
    }

    fn dims_from_mapping(mapping: &Value, index: &str, field: &str) -> Option<usize> {
        // Aliases resolve to the concrete index name, so fall back to the first entry
        let index_mapping = mapping
            .get(index)
            .or_else(|| mapping.as_object().and_then(|m| m.values().next()))?;

        index_mapping["mappings"]["properties"][field]["dims"]
            .as_u64()
            .map(|dims| dims as usize)
    }
}

#[async_trait::async_trait]
impl VectorSearchProvider for ElasticsearchProvider {
    #[instrument(skip(self, vector), fields(index = %self.index, dims = vector.len()))]
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        num_candidates: usize,
    ) -> AppResult<Vec<CatalogEntry>> {
        let response = self
            .with_auth(self.http_client.post(self.url("_search")))
            .json(&self.knn_body(vector, k, num_candidates))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Elasticsearch returned status {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let mut entries: Vec<CatalogEntry> =
            parsed.hits.hits.into_iter().map(CatalogEntry::from).collect();

        // Stable, so equal scores keep the engine's order
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(k);

        tracing::debug!(hits = entries.len(), k, num_candidates, "kNN search completed");

        Ok(entries)
    }
}

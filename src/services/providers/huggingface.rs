/// Hugging Face inference provider
///
/// Calls the feature-extraction pipeline of a hosted sentence-embedding model:
/// `POST {api_url}/models/{model}/pipeline/feature-extraction` with `{"inputs": text}`.
///
/// Depending on the model the response is a flat vector, one row per input
/// (or per token), or a batch of those. Rows are mean-pooled into one vector.
use crate::{
    error::{AppError, AppResult},
    models::Embedding,
    services::providers::EmbeddingProvider,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Clone)]
pub struct HuggingFaceProvider {
    http_client: HttpClient,
    api_url: String,
    api_token: Option<String>,
    model: String,
    /// Expected dimensionality, checked on every response
    dimension: Option<usize>,
    max_chars: usize,
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Flat(Vec<f32>),
    Rows(Vec<Vec<f32>>),
    Batch(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionResponse {
    fn into_embedding(self) -> Option<Embedding> {
        match self {
            FeatureExtractionResponse::Flat(values) => Some(values),
            FeatureExtractionResponse::Rows(rows) => mean_pool(rows),
            FeatureExtractionResponse::Batch(batch) => batch.into_iter().next().and_then(mean_pool),
        }
    }
}

/// Averages rows column-wise; a single row is returned unchanged
fn mean_pool(mut rows: Vec<Vec<f32>>) -> Option<Embedding> {
    match rows.len() {
        0 => None,
        1 => rows.pop(),
        n => {
            let width = rows[0].len();
            if rows.iter().any(|row| row.len() != width) {
                return None;
            }
            let mut pooled = vec![0.0f32; width];
            for row in &rows {
                for (acc, value) in pooled.iter_mut().zip(row) {
                    *acc += value;
                }
            }
            for value in pooled.iter_mut() {
                *value /= n as f32;
            }
            Some(pooled)
        }
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl HuggingFaceProvider {
    pub fn new(
        api_url: String,
        api_token: Option<String>,
        model: String,
        dimension: Option<usize>,
        max_chars: usize,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            api_token,
            model,
            dimension,
            max_chars,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}/pipeline/feature-extraction",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }

    fn check_dimension(&self, embedding: &Embedding) -> AppResult<()> {
        match self.dimension {
            Some(expected) if expected != embedding.len() => Err(AppError::Configuration(format!(
                "Model {} returned {} dimensions, index expects {}",
                self.model,
                embedding.len(),
                expected
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    #[instrument(skip(self, text), fields(model = %self.model, chars = text.chars().count()))]
    async fn embed(&self, text: &str) -> AppResult<Embedding> {
        let inputs = truncate_chars(text, self.max_chars);
        if inputs.len() < text.len() {
            tracing::debug!(max_chars = self.max_chars, "Truncated embedding input");
        }

        let mut request = self
            .http_client
            .post(self.endpoint())
            .json(&FeatureExtractionRequest { inputs });

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Hugging Face API returned status {}: {}",
                status, body
            )));
        }

        let parsed: FeatureExtractionResponse = response.json().await?;
        let embedding = parsed
            .into_embedding()
            .filter(|values| !values.is_empty())
            .ok_or_else(|| AppError::ExternalApi("No embedding returned".to_string()))?;

        self.check_dimension(&embedding)?;

        tracing::debug!(dimension = embedding.len(), "Embedding computed");

        Ok(embedding)
    }
}

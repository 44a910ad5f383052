use serde::{Deserialize, Serialize};

/// A project returned by the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub score: f64,
    /// Stored document without its embedding field
    pub source: serde_json::Value,
}

/// Final answer for `GET /recommendations`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub ok: bool,
    pub user_id: String,
    /// `None` (serialized as `null`) when every candidate was already seen
    pub projects: Option<Vec<CatalogEntry>>,
}

impl RecommendationResult {
    pub fn new(user_id: impl Into<String>, projects: Option<Vec<CatalogEntry>>) -> Self {
        Self {
            ok: true,
            user_id: user_id.into(),
            projects,
        }
    }
}

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use user_routing::api::{create_router, AppState};
use user_routing::db::{HistoryStore, MemoryCache};
use user_routing::error::{AppError, AppResult};
use user_routing::models::{CatalogEntry, HistoryRecord, UserId, UserIdFormat};
use user_routing::services::providers::{EmbeddingProvider, VectorSearchProvider};
use user_routing::services::{RecommendationService, RecommendationSettings};

#[derive(Default)]
struct Calls {
    history: AtomicUsize,
    embed: AtomicUsize,
    search: AtomicUsize,
}

impl Calls {
    fn total(&self) -> usize {
        self.history.load(Ordering::SeqCst)
            + self.embed.load(Ordering::SeqCst)
            + self.search.load(Ordering::SeqCst)
    }
}

struct FakeHistory {
    records: HashMap<String, Vec<HistoryRecord>>,
    calls: Arc<Calls>,
}

#[async_trait]
impl HistoryStore for FakeHistory {
    async fn fetch(&self, user_id: &UserId) -> AppResult<Vec<HistoryRecord>> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(&user_id.key()).cloned().unwrap_or_default())
    }
}

struct FakeEmbedder {
    calls: Arc<Calls>,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.calls.embed.fetch_add(1, Ordering::SeqCst);
        Ok(vec![text.len() as f32, 1.0])
    }
}

struct FakeSearch {
    hits: Vec<CatalogEntry>,
    fail: bool,
    calls: Arc<Calls>,
}

#[async_trait]
impl VectorSearchProvider for FakeSearch {
    async fn search(
        &self,
        _vector: &[f32],
        k: usize,
        _num_candidates: usize,
    ) -> AppResult<Vec<CatalogEntry>> {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::ExternalApi("index unavailable".to_string()));
        }
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

fn entry(id: &str, score: f64) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        score,
        source: json!({ "name": format!("Project {}", id), "category": "food" }),
    }
}

fn create_test_app(fail_search: bool) -> (Router, Arc<Calls>) {
    let calls = Arc::new(Calls::default());

    let mut records = HashMap::new();
    records.insert(
        "cook".to_string(),
        vec![HistoryRecord::new("cook", "A", "I like cooking")],
    );
    records.insert(
        "veteran".to_string(),
        vec![
            HistoryRecord::new("veteran", "A", "one"),
            HistoryRecord::new("veteran", "B", "two"),
            HistoryRecord::new("veteran", "C", "three"),
        ],
    );

    let service = RecommendationService::new(
        Arc::new(FakeHistory {
            records,
            calls: calls.clone(),
        }),
        Arc::new(FakeEmbedder {
            calls: calls.clone(),
        }),
        Arc::new(FakeSearch {
            hits: vec![entry("A", 0.99), entry("B", 0.80), entry("C", 0.5)],
            fail: fail_search,
            calls: calls.clone(),
        }),
        Arc::new(MemoryCache::new(Duration::from_secs(60), 100)),
        RecommendationSettings::default(),
    );

    let state = AppState::new(Arc::new(service), UserIdFormat::Auto);
    (create_router(state), calls)
}

async fn send(app: &Router, method: &str, user_id: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri("/recommendations");
    if let Some(id) = user_id {
        request = request.header("userId", id);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app(false);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_recommendations_skip_interviewed_projects() {
    let (app, _) = create_test_app(false);
    let (status, body) = send(&app, "GET", Some("cook")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["userId"], "cook");
    assert_eq!(body["projects"].as_array().unwrap().len(), 1);
    assert_eq!(body["projects"][0]["id"], "B");
    assert_eq!(body["projects"][0]["score"], 0.8);
    assert_eq!(body["projects"][0]["source"]["name"], "Project B");
}

#[tokio::test]
async fn test_missing_user_id_is_bad_request() {
    let (app, calls) = create_test_app(false);
    let (status, body) = send(&app, "GET", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Missing userId header");
    assert_eq!(calls.total(), 0);
}

#[tokio::test]
async fn test_repeat_request_is_cached() {
    let (app, calls) = create_test_app(false);

    let (_, first) = send(&app, "GET", Some("cook")).await;
    let after_first = calls.total();
    let (_, second) = send(&app, "GET", Some("cook")).await;

    assert_eq!(first, second);
    assert_eq!(after_first, 3);
    assert_eq!(calls.total(), after_first);
}

#[tokio::test]
async fn test_new_user_gets_recommendations() {
    let (app, _) = create_test_app(false);
    let (status, body) = send(&app, "GET", Some("newcomer")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects"][0]["id"], "A");
}

#[tokio::test]
async fn test_everything_seen_returns_null_projects() {
    let (app, _) = create_test_app(false);
    let (status, body) = send(&app, "GET", Some("veteran")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["projects"].is_null());
}

#[tokio::test]
async fn test_upstream_failure_is_server_error_and_not_cached() {
    let (app, calls) = create_test_app(true);

    let (status, body) = send(&app, "GET", Some("cook")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
    assert!(body.get("projects").is_none());

    // Nothing was cached, so the pipeline runs again
    send(&app, "GET", Some("cook")).await;
    assert_eq!(calls.search.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_then_recompute() {
    let (app, calls) = create_test_app(false);

    send(&app, "GET", Some("cook")).await;

    let (status, body) = send(&app, "DELETE", Some("cook")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invalidated"], true);
    assert_eq!(body["userId"], "cook");

    let (_, body) = send(&app, "DELETE", Some("cook")).await;
    assert_eq!(body["invalidated"], false);

    send(&app, "GET", Some("cook")).await;
    assert_eq!(calls.history.load(Ordering::SeqCst), 2);
}

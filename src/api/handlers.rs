use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::models::{RecommendationResult, UserId, UserIdFormat, USER_ID_HEADER};

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub ok: bool,
    pub user_id: String,
    pub invalidated: bool,
}

/// Extracts and classifies the `userId` header
pub fn user_id_from_headers(headers: &HeaderMap, format: UserIdFormat) -> AppResult<UserId> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidInput("Missing userId header".to_string()))?;

    UserId::parse(raw, format)
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Recommends projects the user has not interviewed for yet
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<RecommendationResult>> {
    let user_id = user_id_from_headers(&headers, state.user_id_format)?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Processing recommendation request"
    );

    let result = state.recommendations.recommend(&user_id).await?;

    Ok(Json(result))
}

/// Drops the cached recommendation so new history is picked up
pub async fn invalidate_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<InvalidateResponse>> {
    let user_id = user_id_from_headers(&headers, state.user_id_format)?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Invalidating cached recommendations"
    );

    let invalidated = state.recommendations.invalidate(&user_id).await?;

    Ok(Json(InvalidateResponse {
        ok: true,
        user_id: user_id.key(),
        invalidated,
    }))
}

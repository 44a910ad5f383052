use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Extension,
};

use crate::error::{AppError, AppResult};
use crate::middleware::{RequestId, REQUEST_ID_HEADER};
use crate::models::{UserId, UserIdFormat, USER_ID_HEADER};

use super::GatewayState;

/// Connection-scoped headers that must not be replayed on the upstream hop
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str()) || *name == header::CONTENT_LENGTH
}

fn end_to_end(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 1);
    for (name, value) in incoming.iter() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Copies end-to-end headers and stamps the gateway's request id
pub fn forwarded_headers(incoming: &HeaderMap, request_id: &RequestId) -> HeaderMap {
    let mut headers = end_to_end(incoming);
    if let Some(value) = request_id.header_value() {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    headers
}

/// `{endpoint}/{path}?{query}` with exactly one slash at the seam
pub fn target_url(endpoint: &str, uri: &Uri) -> String {
    let mut url = format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        uri.path().trim_start_matches('/')
    );
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Hash key for a `userId` header value
///
/// ObjectId-shaped ids are lowercased the way the replica keys its cache, so
/// `65F1...` and `65f1...` land on the same replica.
pub fn routing_key(raw: &str) -> AppResult<String> {
    UserId::parse(raw, UserIdFormat::Auto).map(|id| id.key())
}

/// Copies the replica's end-to-end response headers onto the relayed response
///
/// A response without a content type is relayed as raw bytes.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = end_to_end(upstream);
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
    }
    headers
}

/// Forwards any request to the replica that owns its `userId`
///
/// Status, end-to-end headers and body bytes of the replica's response are
/// relayed unchanged, so JSON stays JSON, redirects stay redirects and
/// everything else passes through raw.
pub async fn proxy(
    State(state): State<GatewayState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidInput("Missing userId header".to_string()))
        .and_then(routing_key)?;

    let endpoint = state.partitioner.route(&user_id);
    let url = target_url(endpoint, &uri);

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        endpoint = %endpoint,
        method = %method,
        path = %uri.path(),
        "Forwarding request"
    );

    let upstream = state
        .http_client
        .request(method, &url)
        .headers(forwarded_headers(&headers, &request_id))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, endpoint = %endpoint, "Upstream request failed");
            e
        })?;

    let status = upstream.status();
    let response_headers = relayed_headers(upstream.headers());
    let bytes = upstream.bytes().await?;

    tracing::debug!(
        status = %status,
        bytes = bytes.len(),
        json = response_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json")),
        "Relaying upstream response"
    );

    Ok((status, response_headers, bytes).into_response())
}

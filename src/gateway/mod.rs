//! Consistent-hash gateway in front of the replica pool
//!
//! Every request is forwarded, untouched, to the replica selected from its
//! `userId` header, so a given user always lands on the same replica cache
//! for a fixed endpoint list.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use reqwest::{redirect, Client as HttpClient};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::middleware::{make_span_with_request_id, request_id_middleware};
use crate::services::{build_partitioner, Partitioner};

pub mod proxy;

/// Immutable gateway state; no per-user data is kept
#[derive(Clone)]
pub struct GatewayState {
    pub partitioner: Arc<dyn Partitioner>,
    pub http_client: HttpClient,
}

impl GatewayState {
    pub fn new(partitioner: Arc<dyn Partitioner>, http_client: HttpClient) -> Self {
        Self {
            partitioner,
            http_client,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let partitioner: Arc<dyn Partitioner> = build_partitioner(
            config.routing_strategy,
            config.backend_endpoints.clone(),
            config.ring_virtual_nodes,
        )?
        .into();

        let http_client = build_http_client(config.forward_timeout())?;

        tracing::info!(
            strategy = ?config.routing_strategy,
            endpoints = ?config.backend_endpoints,
            "Gateway routing configured"
        );

        Ok(Self::new(partitioner, http_client))
    }
}

/// Upstream client for forwarded requests
///
/// Redirects are relayed to the caller, never followed by the gateway.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()
}

/// Creates the gateway router: everything except its own health probe is proxied
pub fn create_gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway/health", get(crate::api::handlers::health_check))
        .fallback(proxy::proxy)
        .with_state(state)
        // Bodies are relayed, not interpreted; the replica decides what it accepts
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

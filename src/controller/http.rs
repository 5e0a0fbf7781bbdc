//! HTTP API for the controller
//!
//! Forwarded management calls all go through one fallback handler that hands
//! the request to [`Controller`]; routing itself lives in the route table.
//! The controller also serves two local endpoints:
//! - `GET /health`
//! - `GET /nodes` (current node directory)

use crate::common::tracing_middleware::{request_tracing_middleware, RequestId};
use crate::common::utils::QueryParams;
use crate::common::Result;
use crate::controller::aggregate::AggregateResponse;
use crate::controller::service::{Controller, ControllerRequest};
use axum::{
    body::Bytes,
    extract::{Extension, Query, State},
    http::{Method, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ControllerState {
    pub controller: Arc<Controller>,
    /// Flips to `true` when the controller shuts down
    pub shutdown: watch::Receiver<bool>,
}

impl ControllerState {
    pub fn new(controller: Arc<Controller>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            controller,
            shutdown,
        }
    }
}

/// Resolves once shutdown is signalled; never if the sender is gone
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn create_router(state: ControllerState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/nodes", get(list_nodes))
        .fallback(forward)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_tracing_middleware))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Forward a management call to the nodes selected by `scope`/`nodeId`.
///
/// Dropping this future (client gone) drops every outstanding node call.
async fn forward(
    State(state): State<ControllerState>,
    request_id: Option<Extension<RequestId>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<AggregateResponse> {
    let mut request = ControllerRequest::new(method, uri.path())
        .with_query(QueryParams::from_pairs(pairs))
        .with_body(body);
    if let Some(Extension(RequestId(id))) = request_id {
        request = request.with_request_id(id);
    }

    state
        .controller
        .handle_until(request, shutdown_signal(state.shutdown.clone()))
        .await
}

async fn health(State(state): State<ControllerState>) -> impl IntoResponse {
    let snapshot = state.controller.registry().snapshot();
    Json(json!({
        "status": "healthy",
        "nodes": snapshot.len(),
        "version": crate::VERSION,
    }))
}

async fn list_nodes(State(state): State<ControllerState>) -> impl IntoResponse {
    let snapshot = state.controller.registry().snapshot();
    let nodes: Vec<_> = snapshot.iter().cloned().collect();
    Json(nodes)
}

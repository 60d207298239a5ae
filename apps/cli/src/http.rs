//! HTTP transport: the config endpoint and the metrics listener.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::{error, info_span};
use uuid::Uuid;

use mcserver_core::Server;
use mcserver_shared::PoolRequest;

use crate::metrics::ServerMetrics;

/// Shared state for the config endpoint.
#[derive(Clone)]
pub(crate) struct AppState {
    pub server: Arc<dyn Server>,
    pub metrics: Arc<ServerMetrics>,
}

/// Routes served to booting nodes.
pub(crate) fn config_router(state: AppState) -> Router {
    Router::new()
        .route("/config/{pool}", get(config_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Routes served on the metrics listener.
pub(crate) fn metrics_router(metrics: Arc<ServerMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// GET /config/{pool}
///
/// Streams the raw provisioning document. Any error fails the whole request;
/// a partial document is never served. Error details stay in the logs.
async fn config_handler(State(state): State<AppState>, Path(pool): Path<String>) -> Response {
    let request = PoolRequest::new(pool);
    let request_id = Uuid::now_v7();
    let span = info_span!("config_request", %request_id, pool = %request);
    let server = Arc::clone(&state.server);

    let result =
        tokio::task::spawn_blocking(move || span.in_scope(|| server.get_config(&request))).await;

    match result {
        Ok(Ok(doc)) => {
            state.metrics.record_served();
            (
                [(header::CONTENT_TYPE, "application/json")],
                doc.into_bytes(),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            state.metrics.record_failure();
            error!(%request_id, error = %e, "could not produce provisioning document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not produce provisioning document (request {request_id})"),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.record_failure();
            error!(%request_id, error = %e, "config request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /metrics
async fn metrics_handler(State(metrics): State<Arc<ServerMetrics>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.to_prometheus(),
    )
}

//! HTTP/WebSocket router configuration

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::metrics::metrics_handler;
use super::ws::{ws_handler, WsState};

/// Build the router: client WebSocket, line inspection, health, metrics.
pub fn build_router(state: WsState, prometheus_handle: PrometheusHandle) -> Router {
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .route("/lines/:line/calls", get(get_line_calls))
        .with_state(state)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Read-only snapshot of a line's current calls, for diagnostics.
async fn get_line_calls(
    Path(line): Path<String>,
    State(state): State<WsState>,
) -> Json<Value> {
    let calls = state.manager.get_line_calls(&line);
    Json(json!({"line": line, "calls": calls}))
}

//! Metrics exposition.
//!
//! Sits outermost so scrapes are neither logged nor counted.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::registry::CONTENT_TYPE;

/// Answer requests on the configured metrics path with the registry
/// snapshot; pass everything else through.
pub async fn serve_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let metrics_config = &state.config.metrics;
    if !metrics_config.enabled || request.uri().path() != metrics_config.path {
        return next.run(request).await;
    }

    if let Err(e) = state.metrics.refresh_process(&state.process) {
        state.logger.warn(
            "Dropped metric sample",
            json!({ "error": e.to_string(), "route": metrics_config.path }),
        );
    }

    let body = state.metrics.registry().snapshot();
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

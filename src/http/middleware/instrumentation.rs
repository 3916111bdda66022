//! Request instrumentation.
//!
//! # Responsibilities
//! - Capture a `RequestContext` when the request enters
//! - Defer completion until the response body finishes streaming
//! - Emit exactly one "HTTP request" event and one sample per request metric
//!
//! # Design Decisions
//! - Completion is tied to the body, not to the handler returning: a
//!   streamed response is measured to its last byte
//! - A response abandoned mid-stream is never reported
//! - HEAD requests and 1xx/204/304 responses carry no body and are reported
//!   as soon as the handler returns
//! - Metric failures are logged and swallowed; the request is unaffected

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Map, Value};

use crate::http::body::CompletionBody;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::{HttpMetrics, StructuredLogger};

/// Start/end hooks around one request/response cycle.
#[derive(Debug)]
pub struct RequestInstrumentation {
    metrics: HttpMetrics,
    logger: Arc<StructuredLogger>,
}

impl RequestInstrumentation {
    pub fn new(metrics: HttpMetrics, logger: Arc<StructuredLogger>) -> Self {
        Self { metrics, logger }
    }

    pub fn on_request_start(&self, request: &Request) -> RequestContext {
        RequestContext::capture(request)
    }

    pub fn on_request_end(&self, ctx: RequestContext, status: u16) {
        self.on_request_end_at(ctx, status, Instant::now());
    }

    /// Finish `ctx` as if the response completed at `end`.
    pub fn on_request_end_at(&self, ctx: RequestContext, status: u16, end: Instant) -> Duration {
        let elapsed = ctx.elapsed_until(end);

        let mut fields = Map::new();
        fields.insert("method".into(), json!(ctx.method().as_str()));
        fields.insert("url".into(), json!(ctx.url()));
        fields.insert("route".into(), json!(ctx.route()));
        fields.insert("status_code".into(), json!(status));
        fields.insert("duration_ms".into(), json!(elapsed.as_secs_f64() * 1000.0));
        if let Some(agent) = ctx.user_agent() {
            fields.insert("user_agent".into(), json!(agent));
        }
        if let Some(id) = ctx.request_id() {
            fields.insert("request_id".into(), json!(id));
        }
        self.logger.info("HTTP request", Value::Object(fields));

        if let Err(e) =
            self.metrics
                .record_request(ctx.method().as_str(), ctx.route(), status, elapsed)
        {
            self.logger.warn(
                "Dropped metric sample",
                json!({ "error": e.to_string(), "route": ctx.route() }),
            );
        }

        elapsed
    }
}

/// Middleware entry point. Wraps the response body so the end hook runs at
/// end-of-stream.
pub async fn instrument_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let instrumentation = state.instrumentation.clone();
    let ctx = instrumentation.on_request_start(&request);
    let head = request.method() == Method::HEAD;

    let response = next.run(request).await;
    let status = response.status();

    // The server never polls these bodies
    if head || never_has_body(status) {
        instrumentation.on_request_end(ctx, status.as_u16());
        return response;
    }

    let status = status.as_u16();
    let (parts, body) = response.into_parts();
    let body = CompletionBody::new(body, move || {
        instrumentation.on_request_end(ctx, status);
    });
    Response::from_parts(parts, Body::new(body))
}

fn never_has_body(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

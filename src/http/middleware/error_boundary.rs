//! Last-resort fault handling.
//!
//! # Responsibilities
//! - Detect faults raised below it (handler errors and captured panics)
//! - Count them under `errors_total{type="unhandled_error"}`
//! - Log one "Unhandled error" event with request details
//! - Replace the response with a safe 500 body
//!
//! # Design Decisions
//! - Request details are captured before the inner service consumes the
//!   request
//! - The principal may be attached by auth layers on either the request or
//!   the response; the response wins

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Map, Value};

use crate::http::request::{request_id, request_url, Principal};
use crate::http::response::{internal_error, UnhandledFault};
use crate::http::server::AppState;
use crate::observability::metrics::UNHANDLED_ERROR;
use crate::observability::{HttpMetrics, StructuredLogger};

/// Request details needed to report a fault.
#[derive(Debug, Clone, Default)]
pub struct FaultContext {
    pub method: String,
    pub url: String,
    pub request_id: Option<String>,
    pub principal: Option<Principal>,
}

impl FaultContext {
    pub fn capture(request: &Request) -> Self {
        Self {
            method: request.method().to_string(),
            url: request_url(request),
            request_id: request_id(request),
            principal: request.extensions().get::<Principal>().cloned(),
        }
    }
}

#[derive(Debug)]
pub struct ErrorBoundary {
    metrics: HttpMetrics,
    logger: Arc<StructuredLogger>,
    production: bool,
}

impl ErrorBoundary {
    pub fn new(metrics: HttpMetrics, logger: Arc<StructuredLogger>, production: bool) -> Self {
        Self {
            metrics,
            logger,
            production,
        }
    }

    /// Record `fault` and build the client response.
    pub fn handle(&self, fault: &UnhandledFault, ctx: &FaultContext) -> Response {
        if let Err(e) = self.metrics.record_error(UNHANDLED_ERROR) {
            self.logger.warn(
                "Dropped metric sample",
                json!({ "error": e.to_string(), "type": UNHANDLED_ERROR }),
            );
        }

        let mut fields = Map::new();
        fields.insert("error".into(), json!(fault.message));
        if let Some(stack) = &fault.stack {
            fields.insert("stack".into(), json!(stack));
        }
        fields.insert("url".into(), json!(ctx.url));
        fields.insert("method".into(), json!(ctx.method));
        if let Some(Principal(user)) = &ctx.principal {
            fields.insert("user_id".into(), json!(user));
        }
        if let Some(id) = &ctx.request_id {
            fields.insert("request_id".into(), json!(id));
        }
        self.logger.error("Unhandled error", Value::Object(fields));

        internal_error(&fault.message, self.production)
    }
}

/// Middleware entry point.
pub async fn error_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut ctx = FaultContext::capture(&request);
    let response = next.run(request).await;

    let Some(fault) = response.extensions().get::<UnhandledFault>() else {
        return response;
    };
    if let Some(principal) = response.extensions().get::<Principal>() {
        ctx.principal = Some(principal.clone());
    }
    state.error_boundary.handle(fault, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::{DEFAULT_DURATION_BUCKETS, ERRORS_TOTAL};
    use crate::observability::{MemorySink, MetricRegistry, Severity};
    use axum::http::StatusCode;

    fn boundary(production: bool) -> (ErrorBoundary, HttpMetrics, MemorySink) {
        let sink = MemorySink::new();
        let logger = Arc::new(StructuredLogger::builder("test").sink(sink.clone()).build());
        let metrics = HttpMetrics::register(
            Arc::new(MetricRegistry::new()),
            &DEFAULT_DURATION_BUCKETS,
            false,
        )
        .unwrap();
        (
            ErrorBoundary::new(metrics.clone(), logger, production),
            metrics,
            sink,
        )
    }

    fn fault() -> UnhandledFault {
        UnhandledFault {
            message: "connection refused".into(),
            stack: Some("caused by: tcp reset".into()),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_production_hides_details() {
        let (boundary, metrics, sink) = boundary(true);
        let ctx = FaultContext {
            method: "POST".into(),
            url: "/api/bookings".into(),
            request_id: Some("req-1".into()),
            principal: Some(Principal("user-42".into())),
        };

        let response = boundary.handle(&fault(), &ctx);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Internal server error", "message": "Something went wrong" })
        );

        assert_eq!(
            metrics.registry().counter_value(ERRORS_TOTAL, &[UNHANDLED_ERROR]),
            Some(1)
        );
        let errors = sink.records_at(Severity::Error);
        assert_eq!(errors.len(), 1);
        let event = &errors[0];
        assert_eq!(event.message, "Unhandled error");
        assert_eq!(event.field("error").unwrap(), "connection refused");
        assert_eq!(event.field("stack").unwrap(), "caused by: tcp reset");
        assert_eq!(event.field("user_id").unwrap(), "user-42");
        assert_eq!(event.field("request_id").unwrap(), "req-1");
    }

    #[tokio::test]
    async fn test_development_exposes_message() {
        let (boundary, _, sink) = boundary(false);
        let response = boundary.handle(&fault(), &FaultContext::default());
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Internal server error", "message": "connection refused" })
        );
        assert!(sink.records()[0].field("user_id").is_none());
    }
}

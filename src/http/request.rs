//! Per-request descriptors.
//!
//! # Responsibilities
//! - Capture the immutable facts about a request at entry (method, URL,
//!   route template, client agent, request ID)
//! - Expose the authenticated principal set by upstream auth layers
//!
//! # Design Decisions
//! - The route template is preferred over the raw path to bound metric label
//!   cardinality; unmatched requests fall back to the raw path
//! - Elapsed time saturates at zero instead of going negative

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    http::{header, Method},
};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identifier of the authenticated caller, inserted into request or
/// response extensions by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Request state owned by the instrumentation middleware for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    started: Instant,
    method: Method,
    url: String,
    route: String,
    route_resolved: bool,
    user_agent: Option<String>,
    request_id: Option<String>,
}

impl RequestContext {
    /// Capture descriptors from an incoming request, starting the clock now.
    pub fn capture(request: &Request) -> Self {
        Self::capture_at(request, Instant::now())
    }

    pub fn capture_at(request: &Request, started: Instant) -> Self {
        let matched = request.extensions().get::<MatchedPath>();
        let (route, route_resolved) = match matched {
            Some(path) => (path.as_str().to_string(), true),
            None => (request.uri().path().to_string(), false),
        };

        Self {
            started,
            method: request.method().clone(),
            url: request_url(request),
            route,
            route_resolved,
            user_agent: header_str(request, header::USER_AGENT.as_str()),
            request_id: header_str(request, X_REQUEST_ID),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path and query as received.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Route template, or the raw path when no route matched.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn route_resolved(&self) -> bool {
        self.route_resolved
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Time from entry to `end`, clamped to zero.
    pub fn elapsed_until(&self, end: Instant) -> Duration {
        end.saturating_duration_since(self.started)
    }
}

/// Path and query of the request URI.
pub fn request_url(request: &Request) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Request ID assigned by the request-id layer, if any.
pub fn request_id(request: &Request) -> Option<String> {
    header_str(request, X_REQUEST_ID)
}

fn header_str(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::USER_AGENT, "curl/8.0")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_raw_path_fallback() {
        let ctx = RequestContext::capture(&request("/api/rooms/42?full=true"));
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.url(), "/api/rooms/42?full=true");
        assert_eq!(ctx.route(), "/api/rooms/42");
        assert!(!ctx.route_resolved());
        assert_eq!(ctx.user_agent(), Some("curl/8.0"));
        assert_eq!(ctx.request_id(), Some("abc-123"));
    }

    #[test]
    fn test_missing_headers_are_none() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let ctx = RequestContext::capture(&req);
        assert_eq!(ctx.user_agent(), None);
        assert_eq!(ctx.request_id(), None);
    }

    #[test]
    fn test_elapsed_is_clamped() {
        let now = Instant::now();
        let later = now + Duration::from_millis(1500);
        let req = request("/");

        let ctx = RequestContext::capture_at(&req, now);
        assert_eq!(ctx.elapsed_until(later), Duration::from_millis(1500));

        // End observed before start: clock skew
        let skewed = RequestContext::capture_at(&req, later);
        assert_eq!(skewed.elapsed_until(now), Duration::ZERO);
    }
}

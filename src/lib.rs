//! Observability pipeline for the hotel booking backend.
//!
//! Wraps business routes with request instrumentation, a metrics
//! exposition endpoint, a liveness endpoint, a last-resort error boundary
//! and a 404 fallback.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::{build_router, AppState, HttpServer, Principal, RequestFault};
pub use lifecycle::Shutdown;
pub use observability::{HttpMetrics, MetricRegistry, StructuredLogger};

//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared application state (metrics, logger, process info)
//! - Wrap business routes in the observability pipeline
//! - Serve on a listener until shutdown is signalled
//!
//! # Design Decisions
//! - Layers are attached with `Router::layer` so the matched route template
//!   is visible to instrumentation
//! - `/health` and the 404 fallback are owned here; business routers must
//!   not define either

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};

use crate::config::AppConfig;
use crate::health::{health_check, HEALTH_PATH};
use crate::http::fallback::route_not_found;
use crate::http::middleware::{
    error_boundary, instrument_request, serve_metrics, ErrorBoundary, RequestInstrumentation,
};
use crate::http::response::panic_fault;
use crate::observability::{HttpMetrics, MetricRegistry, MetricsError, ProcessInfo, StructuredLogger};

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: HttpMetrics,
    pub logger: Arc<StructuredLogger>,
    pub instrumentation: Arc<RequestInstrumentation>,
    pub error_boundary: Arc<ErrorBoundary>,
    pub process: Arc<ProcessInfo>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// State backed by a fresh registry. `process` should be created as
    /// early as possible so uptime counts from process start.
    pub fn new(
        config: &AppConfig,
        logger: Arc<StructuredLogger>,
        process: Arc<ProcessInfo>,
    ) -> Result<Self, MetricsError> {
        Self::with_registry(config, logger, Arc::new(MetricRegistry::new()), process)
    }

    /// State backed by `registry`. Fails if the metric catalog cannot be
    /// registered on it.
    pub fn with_registry(
        config: &AppConfig,
        logger: Arc<StructuredLogger>,
        registry: Arc<MetricRegistry>,
        process: Arc<ProcessInfo>,
    ) -> Result<Self, MetricsError> {
        let metrics = HttpMetrics::register(
            registry,
            &config.metrics.duration_buckets,
            config.metrics.process_metrics,
        )?;

        Ok(Self {
            instrumentation: Arc::new(RequestInstrumentation::new(
                metrics.clone(),
                logger.clone(),
            )),
            error_boundary: Arc::new(ErrorBoundary::new(
                metrics.clone(),
                logger.clone(),
                config.is_production(),
            )),
            metrics,
            logger,
            process,
            config: Arc::new(config.clone()),
        })
    }
}

/// Wrap `routes` with `/health`, the 404 fallback and the observability
/// layers.
pub fn build_router(state: AppState, routes: Router) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_check))
        .fallback(route_not_found)
        .with_state(state.clone())
        .merge(routes)
        // Innermost first
        .layer(CatchPanicLayer::custom(panic_fault))
        .layer(from_fn_with_state(state.clone(), error_boundary))
        .layer(from_fn_with_state(state.clone(), instrument_request))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(from_fn_with_state(state, serve_metrics))
}

/// HTTP server for the booking backend.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, routes: Router) -> Self {
        Self {
            router: build_router(state, routes),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

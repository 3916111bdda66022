//! Observability middleware, outermost first:
//!
//! ```text
//! exposition.rs       metrics path short-circuit
//! (request id)        tower-http set/propagate x-request-id
//! instrumentation.rs  per-request log event and metrics
//! error_boundary.rs   fault → 500, error metric, error event
//! (panic capture)     tower-http CatchPanicLayer
//! ```

pub mod error_boundary;
pub mod exposition;
pub mod instrumentation;

pub use error_boundary::{error_boundary, ErrorBoundary, FaultContext};
pub use exposition::serve_metrics;
pub use instrumentation::{instrument_request, RequestInstrumentation};

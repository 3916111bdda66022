//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → middleware/ (exposition, request id, instrumentation, error boundary)
//!     → business routes or /health
//!     → fallback.rs (404 for anything unmatched)
//!     → body.rs (completion reported at end-of-stream)
//!     → Send to client
//! ```

pub mod body;
pub mod fallback;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{Principal, RequestContext, X_REQUEST_ID};
pub use response::{RequestFault, UnhandledFault};
pub use server::{build_router, AppState, HttpServer};

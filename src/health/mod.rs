//! Liveness endpoint.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → report.rs (uptime, memory via ProcessInfo, environment)
//!     → 200 JSON
//! ```
//!
//! # Design Decisions
//! - No downstream dependencies are checked; the endpoint only proves the
//!   process is serving
//! - Registered next to business routes, so it is instrumented like them

pub mod report;

pub use report::{health_check, HealthReport};

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

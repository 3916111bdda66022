//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Instrumentation / error boundary / not-found handler produce:
//!     → logging.rs (structured records)
//!         → sinks.rs (console, error file, combined file)
//!     → metrics.rs (typed catalog)
//!         → registry.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log files / stdout
//!     → Metrics endpoint (text exposition scrape)
//!     → Health endpoint (process.rs)
//! ```
//!
//! # Design Decisions
//! - Registry and logger are built explicitly and injected, never global
//! - Metric updates are atomic; no lock on the request path
//! - Failures here are contained: a dropped sample or a lost log line,
//!   never a failed request

pub mod logging;
pub mod metrics;
pub mod process;
pub mod registry;
pub mod sinks;

pub use logging::{LogRecord, Severity, StructuredLogger};
pub use metrics::HttpMetrics;
pub use process::{MemoryUsage, ProcessInfo};
pub use registry::{MetricRegistry, MetricsError};
pub use sinks::{ConsoleFormat, FileSink, LogSink, MemorySink, SinkError};

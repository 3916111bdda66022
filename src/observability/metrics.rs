//! Application metric catalog.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status code
//! - `http_request_duration_seconds` (histogram): latency by method, route
//! - `errors_total` (counter): unhandled faults by category
//! - `bookings_total` (counter): bookings by outcome, fed by the business layer
//! - `process_*` (gauges): memory, start time and uptime, refreshed per scrape

use std::sync::Arc;
use std::time::Duration;

use crate::observability::process::ProcessInfo;
use crate::observability::registry::{MetricRegistry, MetricsError};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ERRORS_TOTAL: &str = "errors_total";
pub const BOOKINGS_TOTAL: &str = "bookings_total";

pub const PROCESS_RESIDENT_MEMORY_BYTES: &str = "process_resident_memory_bytes";
pub const PROCESS_VIRTUAL_MEMORY_BYTES: &str = "process_virtual_memory_bytes";
pub const PROCESS_START_TIME_SECONDS: &str = "process_start_time_seconds";
pub const PROCESS_UPTIME_SECONDS: &str = "process_uptime_seconds";

/// Error category recorded by the error boundary.
pub const UNHANDLED_ERROR: &str = "unhandled_error";

/// Latency buckets in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 5] = [0.1, 0.5, 1.0, 2.0, 5.0];

/// Typed front for the application's metrics.
#[derive(Clone, Debug)]
pub struct HttpMetrics {
    registry: Arc<MetricRegistry>,
}

impl HttpMetrics {
    /// Register the catalog on `registry`. Safe to call more than once with
    /// the same buckets.
    pub fn register(
        registry: Arc<MetricRegistry>,
        duration_buckets: &[f64],
        process_metrics: bool,
    ) -> Result<Self, MetricsError> {
        registry.register_counter(
            HTTP_REQUESTS_TOTAL,
            "Total HTTP requests",
            &["method", "route", "status_code"],
        )?;
        registry.register_histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            "HTTP request duration in seconds",
            &["method", "route"],
            duration_buckets,
        )?;
        registry.register_counter(BOOKINGS_TOTAL, "Total bookings created", &["status"])?;
        registry.register_counter(ERRORS_TOTAL, "Total application errors", &["type"])?;

        if process_metrics {
            registry.register_gauge(
                PROCESS_RESIDENT_MEMORY_BYTES,
                "Resident memory size in bytes",
                &[],
            )?;
            registry.register_gauge(
                PROCESS_VIRTUAL_MEMORY_BYTES,
                "Virtual memory size in bytes",
                &[],
            )?;
            registry.register_gauge(
                PROCESS_START_TIME_SECONDS,
                "Start time of the process since unix epoch in seconds",
                &[],
            )?;
            registry.register_gauge(
                PROCESS_UPTIME_SECONDS,
                "Process uptime in seconds",
                &[],
            )?;
        }

        Ok(Self { registry })
    }

    /// Wrap a registry without registering the catalog.
    #[cfg(test)]
    pub(crate) fn unregistered(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Count one completed request and observe its latency.
    ///
    /// Both updates are attempted; the first failure is returned.
    pub fn record_request(
        &self,
        method: &str,
        route: &str,
        status: u16,
        elapsed: Duration,
    ) -> Result<(), MetricsError> {
        let status = status.to_string();
        let counted = self
            .registry
            .increment_counter(HTTP_REQUESTS_TOTAL, &[method, route, &status]);
        let observed = self.registry.observe_histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            &[method, route],
            elapsed.as_secs_f64(),
        );
        counted.and(observed)
    }

    pub fn record_error(&self, category: &str) -> Result<(), MetricsError> {
        self.registry.increment_counter(ERRORS_TOTAL, &[category])
    }

    pub fn record_booking(&self, status: &str) -> Result<(), MetricsError> {
        self.registry.increment_counter(BOOKINGS_TOTAL, &[status])
    }

    /// Copy current process stats into the process gauges. A no-op when the
    /// gauges were not registered.
    pub fn refresh_process(&self, process: &ProcessInfo) -> Result<(), MetricsError> {
        if !self
            .registry
            .metric_names()
            .iter()
            .any(|n| n == PROCESS_UPTIME_SECONDS)
        {
            return Ok(());
        }

        let memory = process.memory();
        self.registry
            .set_gauge(PROCESS_RESIDENT_MEMORY_BYTES, &[], memory.rss as f64)?;
        self.registry
            .set_gauge(PROCESS_VIRTUAL_MEMORY_BYTES, &[], memory.virtual_memory as f64)?;
        self.registry
            .set_gauge(PROCESS_START_TIME_SECONDS, &[], process.start_time_unix())?;
        self.registry
            .set_gauge(PROCESS_UPTIME_SECONDS, &[], process.uptime().as_secs_f64())
    }
}

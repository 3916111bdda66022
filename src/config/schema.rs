//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::observability::metrics::DEFAULT_DURATION_BUCKETS;
use crate::observability::{ConsoleFormat, Severity};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and environment settings.
    pub server: ServerConfig,

    /// Structured logger settings.
    pub logging: LoggingConfig,

    /// Metrics registry and exposition settings.
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Production hides fault details from clients.
    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Deployment environment tag ("production", "development", ...).
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
        }
    }
}

/// Structured logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum severity written to any sink.
    pub level: Severity,

    /// Service identity stamped on every record.
    pub service_name: String,

    /// Write to stdout.
    pub console: bool,

    /// Console line layout.
    pub console_format: ConsoleFormat,

    /// ANSI colours on the console level.
    pub colorize: bool,

    /// File receiving error-level records only. `None` disables it.
    pub error_file: Option<String>,

    /// File receiving every record. `None` disables it.
    pub combined_file: Option<String>,

    /// Lines buffered per sink before new ones are dropped.
    pub buffer_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            service_name: "hotel-booking-backend".to_string(),
            console: true,
            console_format: ConsoleFormat::Simple,
            colorize: true,
            error_file: Some("logs/error.log".to_string()),
            combined_file: Some("logs/combined.log".to_string()),
            buffer_capacity: 8192,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve the exposition endpoint.
    pub enabled: bool,

    /// Path of the exposition endpoint.
    pub path: String,

    /// Request latency histogram bounds, in seconds.
    pub duration_buckets: Vec<f64>,

    /// Export process memory and uptime gauges.
    pub process_metrics: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
            process_metrics: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(!config.is_production());
    }

    #[test]
    fn test_partial_document() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 8080
            environment = "Production"

            [logging]
            level = "warn"
            console_format = "json"
            error_file = "/var/log/booking/error.log"

            [metrics]
            path = "/internal/metrics"
            duration_buckets = [0.05, 0.25, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.is_production());
        assert_eq!(config.logging.level, Severity::Warn);
        assert_eq!(config.logging.console_format, ConsoleFormat::Json);
        assert_eq!(config.logging.combined_file.as_deref(), Some("logs/combined.log"));
        assert_eq!(config.metrics.path, "/internal/metrics");
        assert_eq!(config.metrics.duration_buckets, vec![0.05, 0.25, 1.0]);
        assert!(config.metrics.enabled);
    }
}

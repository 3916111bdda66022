//! Structured application logging.
//!
//! # Responsibilities
//! - Build one self-contained record per call (timestamp, level, message,
//!   service tag, contextual fields)
//! - Fan the record out to every configured sink
//! - Contain sink failures: never raise to the caller, report once
//!
//! # Design Decisions
//! - Records are formatted synchronously; sink I/O is the sink's business
//! - The process diagnostic log (`tracing`) is the fallback channel for sink
//!   failures, so a broken sink cannot recurse into itself
//! - Severity threshold is applied before any formatting work

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::LoggingConfig;
use crate::observability::sinks::{ConsoleSink, FileSink, LogSink};

/// Keys owned by the record itself; same-named fields are dropped.
const RESERVED_KEYS: [&str; 4] = ["timestamp", "level", "message", "service"];

/// Log severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown log level `{}`", other)),
        }
    }
}

/// A formatted log event, ready for a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: Severity,
    pub message: String,
    pub service: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Single-line JSON encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

struct SinkSlot {
    sink: Box<dyn LogSink>,
    reported: AtomicBool,
}

/// Fan-out logger shared by every middleware.
pub struct StructuredLogger {
    service: String,
    min_severity: Severity,
    sinks: Vec<SinkSlot>,
}

impl StructuredLogger {
    pub fn builder(service: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder {
            service: service.into(),
            min_severity: Severity::Info,
            sinks: Vec::new(),
        }
    }

    /// Build the logger described by configuration: console plus the
    /// error-only and combined files. A file that cannot be opened is
    /// reported and skipped; the remaining sinks still work.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::builder_from_config(config).build()
    }

    /// Builder preloaded with the configured sinks, for adding more.
    pub fn builder_from_config(config: &LoggingConfig) -> LoggerBuilder {
        let mut builder = Self::builder(config.service_name.clone()).min_severity(config.level);

        if config.console {
            builder = builder.sink(ConsoleSink::new(
                config.console_format,
                config.colorize,
                config.buffer_capacity,
            ));
        }

        let files = [
            (config.error_file.as_deref(), Severity::Error),
            (config.combined_file.as_deref(), Severity::Debug),
        ];
        for (path, min_severity) in files {
            let Some(path) = path else { continue };
            match FileSink::open(path, min_severity, config.buffer_capacity) {
                Ok(sink) => builder = builder.sink(sink),
                Err(e) => tracing::warn!(path = %path, error = %e, "Skipping log file sink"),
            }
        }

        builder
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.sink.name()).collect()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// Format one record and hand it to every sink that accepts it.
    ///
    /// `fields` should be a JSON object; any other value is kept under
    /// a `data` key.
    pub fn log(&self, severity: Severity, message: &str, fields: Value) {
        if !self.enabled(severity) {
            return;
        }

        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: severity,
            message: message.to_string(),
            service: self.service.clone(),
            fields: into_fields(fields),
        };

        for slot in &self.sinks {
            if severity < slot.sink.min_severity() {
                continue;
            }
            if let Err(e) = slot.sink.write(&record) {
                if !slot.reported.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        sink = slot.sink.name(),
                        error = %e,
                        "Log sink failed; further failures from this sink are suppressed"
                    );
                }
            }
        }
    }

    pub fn debug(&self, message: &str, fields: Value) {
        self.log(Severity::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Value) {
        self.log(Severity::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Value) {
        self.log(Severity::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Value) {
        self.log(Severity::Error, message, fields);
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("service", &self.service)
            .field("min_severity", &self.min_severity)
            .field("sinks", &self.sink_names())
            .finish()
    }
}

/// Builder for [`StructuredLogger`].
pub struct LoggerBuilder {
    service: String,
    min_severity: Severity,
    sinks: Vec<SinkSlot>,
}

impl LoggerBuilder {
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(SinkSlot {
            sink: Box::new(sink),
            reported: AtomicBool::new(false),
        });
        self
    }

    pub fn build(self) -> StructuredLogger {
        StructuredLogger {
            service: self.service,
            min_severity: self.min_severity,
            sinks: self.sinks,
        }
    }
}

fn into_fields(fields: Value) -> Map<String, Value> {
    match fields {
        Value::Object(mut map) => {
            for key in RESERVED_KEYS {
                map.remove(key);
            }
            map
        }
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

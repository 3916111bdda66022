//! Log sinks.
//!
//! # Responsibilities
//! - Define the pluggable `LogSink` seam
//! - Console output (simple or JSON lines, optional colour)
//! - Append-only JSON-lines files with a per-file minimum severity
//! - In-memory capture for embedding and tests
//!
//! # Design Decisions
//! - Console and file sinks never touch I/O on the caller's thread: lines go
//!   through a bounded `tracing_appender` queue to a worker thread
//! - A full queue drops the line and counts it; request handling never waits
//!   on a slow disk or terminal

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::observability::logging::{LogRecord, Severity};

/// Failure of a single sink. Never surfaces past the logger.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink `{sink}` failed: {reason}")]
    Failed { sink: String, reason: String },

    #[error("cannot open `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for formatted log records.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;

    /// Records below this severity are not offered to the sink.
    fn min_severity(&self) -> Severity {
        Severity::Debug
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError>;
}

/// Console line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// `level: message {json}`
    #[default]
    Simple,
    /// One JSON object per line.
    Json,
}

/// Writes to standard output through a background writer.
pub struct ConsoleSink {
    format: ConsoleFormat,
    colorize: bool,
    writer: NonBlockingWriter,
}

impl ConsoleSink {
    pub fn new(format: ConsoleFormat, colorize: bool, capacity: usize) -> Self {
        Self {
            format,
            colorize,
            writer: NonBlockingWriter::spawn("console", capacity, io::stdout()),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.writer.dropped()
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = match self.format {
            ConsoleFormat::Simple => format_simple(record, self.colorize)?,
            ConsoleFormat::Json => record.to_json()?,
        };
        self.writer.send(line)
    }
}

/// Appends JSON lines to a file.
pub struct FileSink {
    name: String,
    min_severity: Severity,
    writer: NonBlockingWriter,
}

impl FileSink {
    /// Open (creating parent directories) `path` for appending.
    pub fn open(
        path: impl AsRef<Path>,
        min_severity: Severity,
        capacity: usize,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        let name = format!("file:{}", path.display());
        Ok(Self {
            writer: NonBlockingWriter::spawn(&name, capacity, file),
            name,
            min_severity,
        })
    }

    pub fn dropped(&self) -> u64 {
        self.writer.dropped()
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.writer.send(record.to_json()?)
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    min_severity: Option<Severity>,
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_severity(severity: Severity) -> Self {
        Self {
            min_severity: Some(severity),
            records: Arc::default(),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records at exactly `severity`.
    pub fn records_at(&self, severity: Severity) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == severity)
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity.unwrap_or(Severity::Debug)
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Lossy line writer backed by a `tracing_appender` worker thread.
///
/// Dropping the writer drops its guard, which flushes pending lines.
struct NonBlockingWriter {
    name: String,
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl NonBlockingWriter {
    fn spawn<W>(name: &str, capacity: usize, output: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .buffered_lines_limit(capacity.max(1))
            .thread_name(&format!("log-writer-{}", name))
            .finish(output);

        Self {
            name: name.to_string(),
            writer,
            _guard: guard,
        }
    }

    fn send(&self, mut line: String) -> Result<(), SinkError> {
        line.push('\n');
        // Clones share the worker channel; one write is one queued line
        let mut writer = self.writer.clone();
        writer
            .write_all(line.as_bytes())
            .map_err(|e| SinkError::Failed {
                sink: self.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Lines discarded because the queue was full.
    fn dropped(&self) -> u64 {
        self.writer.error_counter().dropped_lines() as u64
    }
}

fn format_simple(record: &LogRecord, colorize: bool) -> Result<String, SinkError> {
    let mut meta = record.fields.clone();
    meta.insert("service".into(), record.service.clone().into());
    meta.insert("timestamp".into(), record.timestamp.clone().into());
    let meta = serde_json::to_string(&meta)?;

    let level = record.level.as_str();
    let level = if colorize {
        match record.level {
            Severity::Debug => level.blue().to_string(),
            Severity::Info => level.green().to_string(),
            Severity::Warn => level.yellow().to_string(),
            Severity::Error => level.red().to_string(),
        }
    } else {
        level.to_string()
    };

    Ok(format!("{}: {} {}", level, record.message, meta))
}

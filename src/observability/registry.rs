//! Metric registry with Prometheus text exposition.
//!
//! # Responsibilities
//! - Hold counter, gauge and histogram families for the process lifetime
//! - Validate registrations (names, label sets, bucket bounds)
//! - Apply concurrent updates without a global lock
//! - Render a deterministic text snapshot for scraping
//!
//! # Design Decisions
//! - The family list is copy-on-write behind `ArcSwap`; registration is rare,
//!   lookups happen on every request
//! - Series live in a sharded `DashMap` keyed by label values
//! - Sample values are plain atomics; floats are stored as `f64` bits
//! - Families render in registration order, series in label-value order,
//!   labels sorted by key

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use thiserror::Error;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Label reserved for histogram bucket bounds.
const BUCKET_LABEL: &str = "le";

/// Errors raised by registration and sampling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// Invalid or conflicting registration. Fatal at startup.
    #[error("invalid metric configuration for `{name}`: {reason}")]
    Configuration { name: String, reason: String },

    #[error("metric `{name}` expects {expected} label values, got {actual}")]
    LabelArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("metric `{0}` is not registered")]
    UnknownMetric(String),

    #[error("metric `{name}` is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("metric `{name}` cannot record value {value}")]
    InvalidObservation { name: String, value: f64 },
}

impl MetricsError {
    /// Only configuration errors should stop the process; everything else
    /// means a single dropped sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MetricsError::Configuration { .. })
    }

    fn configuration(name: &str, reason: impl Into<String>) -> Self {
        MetricsError::Configuration {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Kind of a registered metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` pairs, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    /// Number of observations; equals the `+Inf` bucket.
    pub count: u64,
    pub sum: f64,
}

/// Process-wide metric store.
pub struct MetricRegistry {
    families: ArcSwap<Vec<Arc<MetricFamily>>>,
    /// Serializes registrations; never taken on the sampling path.
    registration: Mutex<()>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            families: ArcSwap::from_pointee(Vec::new()),
            registration: Mutex::new(()),
        }
    }

    /// Register a monotonically increasing counter.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        self.register(MetricFamily::new(
            name,
            help,
            label_names,
            MetricKind::Counter,
            Vec::new(),
        ))
    }

    /// Register a gauge holding the last value set.
    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        self.register(MetricFamily::new(
            name,
            help,
            label_names,
            MetricKind::Gauge,
            Vec::new(),
        ))
    }

    /// Register a histogram with fixed, strictly ascending bucket bounds.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        bucket_bounds: &[f64],
    ) -> Result<(), MetricsError> {
        validate_buckets(name, bucket_bounds)?;
        if label_names.contains(&BUCKET_LABEL) {
            return Err(MetricsError::configuration(
                name,
                "label `le` is reserved for histogram buckets",
            ));
        }
        self.register(MetricFamily::new(
            name,
            help,
            label_names,
            MetricKind::Histogram,
            bucket_bounds.to_vec(),
        ))
    }

    fn register(&self, family: MetricFamily) -> Result<(), MetricsError> {
        validate_metric_name(&family.name)?;
        validate_label_names(&family.name, &family.label_names)?;

        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.families.load_full();

        if let Some(existing) = current.iter().find(|f| f.name == family.name) {
            return if existing.same_shape(&family) {
                Ok(())
            } else {
                Err(MetricsError::configuration(
                    &family.name,
                    "already registered with a different shape",
                ))
            };
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(family));
        self.families.store(Arc::new(next));
        Ok(())
    }

    /// Increment a counter series by one.
    pub fn increment_counter(&self, name: &str, label_values: &[&str]) -> Result<(), MetricsError> {
        self.increment_counter_by(name, label_values, 1)
    }

    /// Increment a counter series by `delta`.
    pub fn increment_counter_by(
        &self,
        name: &str,
        label_values: &[&str],
        delta: u64,
    ) -> Result<(), MetricsError> {
        let family = self.family(name, MetricKind::Counter)?;
        match &*family.series(label_values)? {
            Series::Counter(value) => {
                value.fetch_add(delta, Ordering::Relaxed);
                Ok(())
            }
            _ => unreachable!("counter family holds counter series"),
        }
    }

    /// Set a gauge series to `value`.
    pub fn set_gauge(&self, name: &str, label_values: &[&str], value: f64) -> Result<(), MetricsError> {
        let family = self.family(name, MetricKind::Gauge)?;
        if value.is_nan() {
            return Err(MetricsError::InvalidObservation {
                name: name.to_string(),
                value,
            });
        }
        match &*family.series(label_values)? {
            Series::Gauge(bits) => {
                bits.store(value.to_bits(), Ordering::Relaxed);
                Ok(())
            }
            _ => unreachable!("gauge family holds gauge series"),
        }
    }

    /// Record one histogram observation.
    pub fn observe_histogram(
        &self,
        name: &str,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), MetricsError> {
        let family = self.family(name, MetricKind::Histogram)?;
        if !value.is_finite() {
            return Err(MetricsError::InvalidObservation {
                name: name.to_string(),
                value,
            });
        }
        match &*family.series(label_values)? {
            Series::Histogram(cells) => {
                cells.observe(&family.buckets, value);
                Ok(())
            }
            _ => unreachable!("histogram family holds histogram series"),
        }
    }

    /// Current value of a counter series, if it has been touched.
    pub fn counter_value(&self, name: &str, label_values: &[&str]) -> Option<u64> {
        let family = self.family(name, MetricKind::Counter).ok()?;
        let series = family.existing_series(label_values)?;
        match &*series {
            Series::Counter(value) => Some(value.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    /// Current value of a gauge series, if it has been set.
    pub fn gauge_value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        let family = self.family(name, MetricKind::Gauge).ok()?;
        let series = family.existing_series(label_values)?;
        match &*series {
            Series::Gauge(bits) => Some(f64::from_bits(bits.load(Ordering::Relaxed))),
            _ => None,
        }
    }

    /// Current state of a histogram series, if it has been observed.
    pub fn histogram_snapshot(&self, name: &str, label_values: &[&str]) -> Option<HistogramSnapshot> {
        let family = self.family(name, MetricKind::Histogram).ok()?;
        let series = family.existing_series(label_values)?;
        match &*series {
            Series::Histogram(cells) => Some(cells.snapshot(&family.buckets)),
            _ => None,
        }
    }

    /// Names of all registered metrics, in registration order.
    pub fn metric_names(&self) -> Vec<String> {
        self.families.load().iter().map(|f| f.name.clone()).collect()
    }

    /// Render every family in the text exposition format.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for family in self.families.load().iter() {
            family.render(&mut out);
        }
        out
    }

    fn family(&self, name: &str, kind: MetricKind) -> Result<Arc<MetricFamily>, MetricsError> {
        let families = self.families.load();
        let family = families
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;
        if family.kind != kind {
            return Err(MetricsError::KindMismatch {
                name: name.to_string(),
                expected: kind,
                actual: family.kind,
            });
        }
        Ok(family.clone())
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metric_names())
            .finish()
    }
}

struct MetricFamily {
    name: String,
    help: String,
    label_names: Vec<String>,
    kind: MetricKind,
    buckets: Vec<f64>,
    series: DashMap<Vec<String>, Arc<Series>>,
}

impl MetricFamily {
    fn new(name: &str, help: &str, label_names: &[&str], kind: MetricKind, buckets: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            kind,
            buckets,
            series: DashMap::new(),
        }
    }

    fn same_shape(&self, other: &MetricFamily) -> bool {
        self.kind == other.kind
            && self.help == other.help
            && self.label_names == other.label_names
            && self.buckets == other.buckets
    }

    fn check_arity(&self, label_values: &[&str]) -> Result<(), MetricsError> {
        if label_values.len() != self.label_names.len() {
            return Err(MetricsError::LabelArity {
                name: self.name.clone(),
                expected: self.label_names.len(),
                actual: label_values.len(),
            });
        }
        Ok(())
    }

    fn series(&self, label_values: &[&str]) -> Result<Arc<Series>, MetricsError> {
        self.check_arity(label_values)?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        if let Some(series) = self.series.get(&key) {
            return Ok(series.clone());
        }
        let series = self
            .series
            .entry(key)
            .or_insert_with(|| Arc::new(Series::new(self.kind, self.buckets.len())))
            .clone();
        Ok(series)
    }

    fn existing_series(&self, label_values: &[&str]) -> Option<Arc<Series>> {
        self.check_arity(label_values).ok()?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.series.get(&key).map(|s| s.clone())
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} {}", self.name, self.kind);

        let mut series: Vec<(Vec<String>, Arc<Series>)> = self
            .series
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        for (values, sample) in series {
            let labels: Vec<(&str, &str)> = self
                .label_names
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str))
                .collect();

            match &*sample {
                Series::Counter(value) => {
                    let _ = writeln!(
                        out,
                        "{}{} {}",
                        self.name,
                        render_labels(&labels, None),
                        value.load(Ordering::Relaxed)
                    );
                }
                Series::Gauge(bits) => {
                    let _ = writeln!(
                        out,
                        "{}{} {}",
                        self.name,
                        render_labels(&labels, None),
                        format_float(f64::from_bits(bits.load(Ordering::Relaxed)))
                    );
                }
                Series::Histogram(cells) => {
                    let snapshot = cells.snapshot(&self.buckets);
                    for (bound, count) in &snapshot.buckets {
                        let le = format_float(*bound);
                        let _ = writeln!(
                            out,
                            "{}_bucket{} {}",
                            self.name,
                            render_labels(&labels, Some(&le)),
                            count
                        );
                    }
                    let _ = writeln!(
                        out,
                        "{}_bucket{} {}",
                        self.name,
                        render_labels(&labels, Some("+Inf")),
                        snapshot.count
                    );
                    let _ = writeln!(
                        out,
                        "{}_sum{} {}",
                        self.name,
                        render_labels(&labels, None),
                        format_float(snapshot.sum)
                    );
                    let _ = writeln!(
                        out,
                        "{}_count{} {}",
                        self.name,
                        render_labels(&labels, None),
                        snapshot.count
                    );
                }
            }
        }
    }
}

enum Series {
    Counter(AtomicU64),
    Gauge(AtomicU64),
    Histogram(HistogramCells),
}

impl Series {
    fn new(kind: MetricKind, bucket_count: usize) -> Self {
        match kind {
            MetricKind::Counter => Series::Counter(AtomicU64::new(0)),
            MetricKind::Gauge => Series::Gauge(AtomicU64::new(0f64.to_bits())),
            MetricKind::Histogram => Series::Histogram(HistogramCells::new(bucket_count)),
        }
    }
}

/// Cumulative bucket counters plus running count and sum.
struct HistogramCells {
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_bits: AtomicU64,
}

impl HistogramCells {
    fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    // Count is bumped before the buckets and read after them, so a
    // concurrent snapshot never shows a bucket above `+Inf`.
    fn observe(&self, bounds: &[f64], value: f64) {
        self.count.fetch_add(1, Ordering::SeqCst);
        for (bound, bucket) in bounds.iter().zip(&self.buckets) {
            if value <= *bound {
                bucket.fetch_add(1, Ordering::SeqCst);
            }
        }
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    fn snapshot(&self, bounds: &[f64]) -> HistogramSnapshot {
        let buckets = bounds
            .iter()
            .zip(&self.buckets)
            .map(|(bound, count)| (*bound, count.load(Ordering::SeqCst)))
            .collect();
        let count = self.count.load(Ordering::SeqCst);
        HistogramSnapshot {
            buckets,
            count,
            sum: f64::from_bits(self.sum_bits.load(Ordering::Relaxed)),
        }
    }
}

fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MetricsError::configuration(name, "invalid metric name"))
    }
}

fn validate_label_names(metric: &str, label_names: &[String]) -> Result<(), MetricsError> {
    for (i, label) in label_names.iter().enumerate() {
        let mut chars = label.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid || label.starts_with("__") {
            return Err(MetricsError::configuration(
                metric,
                format!("invalid label name `{}`", label),
            ));
        }
        if label_names[..i].contains(label) {
            return Err(MetricsError::configuration(
                metric,
                format!("duplicate label name `{}`", label),
            ));
        }
    }
    Ok(())
}

fn validate_buckets(metric: &str, bounds: &[f64]) -> Result<(), MetricsError> {
    if bounds.is_empty() {
        return Err(MetricsError::configuration(metric, "histogram needs at least one bucket"));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(MetricsError::configuration(metric, "bucket bounds must be finite"));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MetricsError::configuration(
            metric,
            "bucket bounds must be strictly ascending",
        ));
    }
    Ok(())
}

/// Render `{k="v",...}` with keys sorted; empty label sets render nothing.
fn render_labels(labels: &[(&str, &str)], le: Option<&str>) -> String {
    let mut pairs: Vec<(&str, &str)> = labels.to_vec();
    if let Some(le) = le {
        pairs.push((BUCKET_LABEL, le));
    }
    if pairs.is_empty() {
        return String::new();
    }
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("{");
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}=\"{}\"", key, escape_label_value(value));
    }
    out.push('}');
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_float(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_http_metrics() -> MetricRegistry {
        let registry = MetricRegistry::new();
        registry
            .register_counter(
                "http_requests_total",
                "Total HTTP requests",
                &["method", "route", "status_code"],
            )
            .unwrap();
        registry
            .register_histogram(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                &[0.1, 0.5, 1.0, 2.0, 5.0],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_counter_counts_every_increment() {
        let registry = registry_with_http_metrics();
        let labels = ["GET", "/rooms/{id}", "200"];

        let mut previous = 0;
        for expected in 1..=25u64 {
            registry.increment_counter("http_requests_total", &labels).unwrap();
            let value = registry.counter_value("http_requests_total", &labels).unwrap();
            assert_eq!(value, expected);
            assert!(value > previous);
            previous = value;
        }

        assert!(registry
            .snapshot()
            .contains("http_requests_total{method=\"GET\",route=\"/rooms/{id}\",status_code=\"200\"} 25\n"));
    }

    #[test]
    fn test_label_arity_mismatch_is_rejected() {
        let registry = registry_with_http_metrics();

        let err = registry
            .increment_counter("http_requests_total", &["GET", "/"])
            .unwrap_err();
        assert_eq!(
            err,
            MetricsError::LabelArity {
                name: "http_requests_total".into(),
                expected: 3,
                actual: 2,
            }
        );
        assert!(!err.is_fatal());
        // The bad sample must not create a series
        assert!(!registry.snapshot().contains("http_requests_total{"));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = registry_with_http_metrics();

        // Same shape is a no-op
        registry
            .register_counter(
                "http_requests_total",
                "Total HTTP requests",
                &["method", "route", "status_code"],
            )
            .unwrap();
        assert_eq!(registry.metric_names().len(), 2);

        // Different labels
        let err = registry
            .register_counter("http_requests_total", "Total HTTP requests", &["method"])
            .unwrap_err();
        assert!(err.is_fatal());

        // Different kind
        let err = registry
            .register_gauge(
                "http_requests_total",
                "Total HTTP requests",
                &["method", "route", "status_code"],
            )
            .unwrap_err();
        assert!(matches!(err, MetricsError::Configuration { .. }));

        // Different buckets
        let err = registry
            .register_histogram(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                &[0.1, 1.0],
            )
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_registrations() {
        let registry = MetricRegistry::new();

        assert!(registry.register_counter("1bad", "help", &[]).unwrap_err().is_fatal());
        assert!(registry.register_counter("ok_total", "help", &["bad-label"]).is_err());
        assert!(registry.register_counter("ok_total", "help", &["a", "a"]).is_err());
        assert!(registry.register_histogram("h", "help", &["le"], &[1.0]).is_err());
        assert!(registry.register_histogram("h", "help", &[], &[]).is_err());
        assert!(registry.register_histogram("h", "help", &[], &[1.0, 1.0]).is_err());
        assert!(registry.register_histogram("h", "help", &[], &[2.0, 1.0]).is_err());
        assert!(registry.register_histogram("h", "help", &[], &[1.0, f64::INFINITY]).is_err());
        assert!(registry.metric_names().is_empty());
    }

    #[test]
    fn test_unknown_and_mismatched_metrics() {
        let registry = registry_with_http_metrics();

        assert_eq!(
            registry.increment_counter("missing_total", &[]),
            Err(MetricsError::UnknownMetric("missing_total".into()))
        );
        assert!(matches!(
            registry.observe_histogram("http_requests_total", &["GET", "/", "200"], 1.0),
            Err(MetricsError::KindMismatch {
                expected: MetricKind::Histogram,
                actual: MetricKind::Counter,
                ..
            })
        ));
        assert!(matches!(
            registry.observe_histogram("http_request_duration_seconds", &["GET", "/"], f64::NAN),
            Err(MetricsError::InvalidObservation { .. })
        ));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let registry = registry_with_http_metrics();
        let labels = ["GET", "/health"];
        let observations = [0.05, 0.1, 0.3, 0.7, 1.5, 4.0, 9.0];

        for value in observations {
            registry
                .observe_histogram("http_request_duration_seconds", &labels, value)
                .unwrap();
        }

        let snapshot = registry
            .histogram_snapshot("http_request_duration_seconds", &labels)
            .unwrap();
        assert_eq!(
            snapshot.buckets,
            vec![(0.1, 2), (0.5, 3), (1.0, 4), (2.0, 5), (5.0, 6)]
        );
        assert_eq!(snapshot.count, observations.len() as u64);
        let expected_sum: f64 = observations.iter().sum();
        assert!((snapshot.sum - expected_sum).abs() < 1e-9);

        let text = registry.snapshot();
        assert!(text.contains(
            "http_request_duration_seconds_bucket{le=\"+Inf\",method=\"GET\",route=\"/health\"} 7\n"
        ));
        assert!(text.contains(
            "http_request_duration_seconds_bucket{le=\"1\",method=\"GET\",route=\"/health\"} 4\n"
        ));
        assert!(text.contains("http_request_duration_seconds_count{method=\"GET\",route=\"/health\"} 7\n"));
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let registry = registry_with_http_metrics();
        registry.register_counter("errors_total", "Total application errors", &["type"]).unwrap();

        registry.increment_counter("http_requests_total", &["POST", "/b", "201"]).unwrap();
        registry.increment_counter("http_requests_total", &["GET", "/a", "200"]).unwrap();
        registry.increment_counter("errors_total", &["unhandled_error"]).unwrap();
        registry
            .observe_histogram("http_request_duration_seconds", &["GET", "/a"], 0.2)
            .unwrap();

        let first = registry.snapshot();
        let second = registry.snapshot();
        assert_eq!(first, second);

        // Registration order for families, label-value order for series
        let requests = first.find("# TYPE http_requests_total counter").unwrap();
        let duration = first.find("# TYPE http_request_duration_seconds histogram").unwrap();
        let errors = first.find("# TYPE errors_total counter").unwrap();
        assert!(requests < duration && duration < errors);

        let get = first.find("method=\"GET\",route=\"/a\"").unwrap();
        let post = first.find("method=\"POST\",route=\"/b\"").unwrap();
        assert!(get < post);
    }

    #[test]
    fn test_label_values_are_escaped() {
        let registry = MetricRegistry::new();
        registry.register_counter("weird_total", "Odd \\ help\nline", &["path"]).unwrap();
        registry.increment_counter("weird_total", &["a\"b\\c\nd"]).unwrap();

        let text = registry.snapshot();
        assert!(text.contains("# HELP weird_total Odd \\\\ help\\nline\n"));
        assert!(text.contains("weird_total{path=\"a\\\"b\\\\c\\nd\"} 1\n"));
    }

    #[test]
    fn test_gauges_and_unlabelled_series() {
        let registry = MetricRegistry::new();
        registry
            .register_gauge("process_resident_memory_bytes", "Resident memory size in bytes", &[])
            .unwrap();

        registry.set_gauge("process_resident_memory_bytes", &[], 1024.0).unwrap();
        registry.set_gauge("process_resident_memory_bytes", &[], 2048.0).unwrap();

        assert_eq!(registry.gauge_value("process_resident_memory_bytes", &[]), Some(2048.0));
        assert!(registry.snapshot().contains("process_resident_memory_bytes 2048\n"));
    }

    #[test]
    fn test_concurrent_increments() {
        let registry = Arc::new(registry_with_http_metrics());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry
                            .increment_counter("http_requests_total", &["GET", "/", "200"])
                            .unwrap();
                        registry
                            .observe_histogram("http_request_duration_seconds", &["GET", "/"], 0.25)
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(
            registry.counter_value("http_requests_total", &["GET", "/", "200"]),
            Some(8000)
        );
        let histogram = registry
            .histogram_snapshot("http_request_duration_seconds", &["GET", "/"])
            .unwrap();
        assert_eq!(histogram.count, 8000);
        assert!((histogram.sum - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_during_observations_stays_cumulative() {
        let registry = Arc::new(registry_with_http_metrics());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..20_000 {
                    registry
                        .observe_histogram("http_request_duration_seconds", &["GET", "/"], 0.05)
                        .unwrap();
                }
            })
        };

        while !writer.is_finished() {
            if let Some(h) = registry.histogram_snapshot("http_request_duration_seconds", &["GET", "/"]) {
                for (_, bucket) in &h.buckets {
                    assert!(*bucket <= h.count, "bucket {} above +Inf {}", bucket, h.count);
                }
            }
        }
        writer.join().unwrap();
    }
}

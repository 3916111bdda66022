//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Keep the metrics path from shadowing the health endpoint
//! - Validate histogram bounds before they reach the registry
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::health::HEALTH_PATH;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("server.host must not be empty")]
    EmptyHost,

    #[error("logging.service_name must not be empty")]
    EmptyServiceName,

    #[error("logging.buffer_capacity must be greater than zero")]
    ZeroBufferCapacity,

    #[error("metrics.path `{0}` must start with `/`")]
    RelativeMetricsPath(String),

    #[error("metrics.path `{0}` collides with the health endpoint")]
    MetricsPathConflict(String),

    #[error("metrics.duration_buckets {0}")]
    InvalidBuckets(&'static str),
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.logging.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }
    if config.logging.buffer_capacity == 0 {
        errors.push(ValidationError::ZeroBufferCapacity);
    }

    let path = &config.metrics.path;
    if !path.starts_with('/') {
        errors.push(ValidationError::RelativeMetricsPath(path.clone()));
    } else if path == HEALTH_PATH {
        errors.push(ValidationError::MetricsPathConflict(path.clone()));
    }

    let buckets = &config.metrics.duration_buckets;
    if buckets.is_empty() {
        errors.push(ValidationError::InvalidBuckets("must not be empty"));
    } else if buckets.iter().any(|b| !b.is_finite() || *b <= 0.0) {
        errors.push(ValidationError::InvalidBuckets("must be finite and positive"));
    } else if buckets.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(ValidationError::InvalidBuckets("must be strictly ascending"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `promgate.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    #[error("service {service}: metric {metric} is defined more than once")]
    DuplicateMetric { service: String, metric: String },

    #[error("metric {metric}: duplicate label {label}")]
    DuplicateLabel { metric: String, label: String },

    #[error("metric {metric}: label {label} is reserved")]
    ReservedLabel { metric: String, label: String },

    #[error("metric {0}: labeled metrics need a collection path")]
    MissingCollectionPath(String),

    #[error("metric {0}: labeled metrics need an item_path")]
    MissingItemPath(String),

    #[error("service {0}: api services need at least one metric")]
    NoMetrics(String),

    #[error("service {0}: forward services need a metrics_path")]
    MissingMetricsPath(String),

    #[error("service {service}: invalid timeout {value:?}")]
    InvalidTimeout { service: String, value: String },

    #[error("handler path must start with '/': {0:?}")]
    InvalidHandlerPath(String),
}

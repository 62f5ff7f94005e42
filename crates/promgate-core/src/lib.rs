//! promgate-core — configuration shared by every promgate crate.
//!
//! The configuration is loaded once at startup and handed read-only to
//! the scrapers and the HTTP layer.

pub mod config;
pub mod error;

pub use config::{
    Config, LabelConfig, MetricConfig, MetricKind, ServiceConfig, ServiceMode, KEY_LABEL_INSTANCE,
    KEY_LABEL_JOB,
};
pub use error::{ConfigError, ConfigResult};

//! promgate.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Identity label naming the scraped program.
pub const KEY_LABEL_JOB: &str = "job";
/// Identity label naming the scraped endpoint.
pub const KEY_LABEL_INSTANCE: &str = "instance";

// Lowercase only: the merge re-parses every name it serves.
static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("metric name regex"));
static LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Value of the `job` label on self-reported metrics.
    #[serde(default = "default_program_name")]
    pub program_name: String,
    /// Externally visible host; the `instance` label on self-reported
    /// metrics. Falls back to the request `Host` header when unset.
    pub listen_address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_handler_path")]
    pub handler_path: String,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// JSON API scraped through metric definitions.
    #[default]
    Api,
    /// Already exposes text exposition; forwarded as-is.
    Forward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub mode: ServiceMode,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub base_path: String,
    /// Per-request timeout, e.g. "5s", "500ms", "1m".
    #[serde(default = "default_timeout")]
    pub timeout: String,
    pub metrics_path: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub kind: MetricKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_http_method")]
    pub http_method: String,
    /// Endpoint relative to the service base URL.
    pub url: String,
    /// Value path for scalar metrics, collection path for labeled ones.
    pub path: String,
    /// Value path inside each collection item.
    pub item_path: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelConfig {
    pub name: String,
    /// Path inside each collection item.
    pub path: String,
}

fn default_program_name() -> String {
    "promgate".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_handler_path() -> String {
    "/metrics".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

fn default_http_method() -> String {
    "GET".to_string()
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        debug!(path = ?path, services = config.services.len(), "config loaded");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.handler_path.starts_with('/') {
            return Err(ConfigError::InvalidHandlerPath(self.handler_path.clone()));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
            service.validate()?;
        }
        Ok(())
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> String {
        match &self.listen_address {
            Some(host) => format!("{host}:{}", self.port),
            None => format!("0.0.0.0:{}", self.port),
        }
    }

    /// `instance` label value for self-reported metrics, if configured.
    pub fn instance_label(&self) -> Option<String> {
        self.listen_address
            .as_ref()
            .map(|host| format!("{host}:{}", self.port))
    }
}

impl ServiceConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.timeout().is_none() {
            return Err(ConfigError::InvalidTimeout {
                service: self.name.clone(),
                value: self.timeout.clone(),
            });
        }

        match self.mode {
            ServiceMode::Api if self.metrics.is_empty() => {
                return Err(ConfigError::NoMetrics(self.name.clone()));
            }
            ServiceMode::Forward if self.metrics_path.is_none() => {
                return Err(ConfigError::MissingMetricsPath(self.name.clone()));
            }
            _ => {}
        }

        let mut names = HashSet::new();
        for metric in &self.metrics {
            metric.validate()?;
            if !names.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateMetric {
                    service: self.name.clone(),
                    metric: metric.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// `scheme://host:port/base_path`.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.base_path.trim_end_matches('/')
        )
    }

    /// `instance` label value for metrics originating from this service.
    pub fn instance(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metric_url(&self, metric: &MetricConfig) -> String {
        join_url(&self.base_url(), &metric.url)
    }

    /// URL of the remote exposition for forward services.
    pub fn forward_url(&self) -> Option<String> {
        self.metrics_path
            .as_deref()
            .map(|path| join_url(&self.base_url(), path))
    }

    pub fn timeout(&self) -> Option<Duration> {
        parse_duration(&self.timeout)
    }
}

impl MetricConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !METRIC_NAME.is_match(&self.name) {
            return Err(ConfigError::InvalidName {
                kind: "metric",
                name: self.name.clone(),
            });
        }
        if self.is_vector() && self.path.trim_matches('/').is_empty() {
            return Err(ConfigError::MissingCollectionPath(self.name.clone()));
        }
        if self.is_vector() && self.item_path.is_none() {
            return Err(ConfigError::MissingItemPath(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            if !LABEL_NAME.is_match(&label.name) || label.name.starts_with("__") {
                return Err(ConfigError::InvalidName {
                    kind: "label",
                    name: label.name.clone(),
                });
            }
            if label.name == KEY_LABEL_JOB || label.name == KEY_LABEL_INSTANCE {
                return Err(ConfigError::ReservedLabel {
                    metric: self.name.clone(),
                    label: label.name.clone(),
                });
            }
            if !seen.insert(label.name.as_str()) {
                return Err(ConfigError::DuplicateLabel {
                    metric: self.name.clone(),
                    label: label.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Labeled metrics, and metrics with an `item_path`, extract one value
    /// per collection item.
    pub fn is_vector(&self) -> bool {
        !self.labels.is_empty() || self.item_path.is_some()
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

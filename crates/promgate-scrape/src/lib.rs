//! promgate-scrape — upstream sources feeding the aggregated endpoint.
//!
//! # Architecture
//!
//! ```text
//! Config.services
//!   ├── mode = api     → ApiScraper
//!   │     └── per (method, url): fetch() → JSON
//!   │           └── per definition: MetricSource::extract() → family
//!   │                 labels: job=<service>, instance=<host:port>, ...
//!   └── mode = forward → ExpositionScraper
//!         └── fetch() → text → fill_missing_labels(job, instance)
//!
//! both implement Forwarder::get_metric() → exposition bytes
//! ScrapeMetrics counts scrapes, failures and durations per source
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod forward;
pub mod metrics;

#[cfg(test)]
mod test_support;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use promgate_core::{Config, ServiceMode};
use tracing::info;

pub use api::ApiScraper;
pub use client::{fetch, gunzip};
pub use error::{ScrapeError, ScrapeResult};
pub use forward::ExpositionScraper;
pub use metrics::ScrapeMetrics;

/// Timeout used when a service timeout cannot be parsed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A source of exposition text, polled once per aggregated request.
pub trait Forwarder: Send + Sync {
    /// Source name used in logs and self metrics.
    fn name(&self) -> &str;

    /// Produce the source's current exposition.
    fn get_metric(&self) -> BoxFuture<'_, ScrapeResult<Vec<u8>>>;
}

/// Build one forwarder per configured service, in configured order.
pub fn build_forwarders(
    config: &Config,
    metrics: &ScrapeMetrics,
) -> ScrapeResult<Vec<Arc<dyn Forwarder>>> {
    let mut forwarders: Vec<Arc<dyn Forwarder>> = Vec::with_capacity(config.services.len());
    for service in &config.services {
        let forwarder: Arc<dyn Forwarder> = match service.mode {
            ServiceMode::Api => Arc::new(ApiScraper::new(service, metrics.clone())?),
            ServiceMode::Forward => Arc::new(ExpositionScraper::new(service, metrics.clone())?),
        };
        info!(
            service = %service.name,
            mode = ?service.mode,
            instance = %service.instance(),
            "forwarder registered"
        );
        forwarders.push(forwarder);
    }
    Ok(forwarders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn builds_forwarders_in_config_order() {
        let config = Config::parse(
            r#"
[[services]]
name = "node"
mode = "forward"
host = "localhost"
port = 9100
metrics_path = "/metrics"

[[services]]
name = "wallet"
host = "localhost"
port = 6420

  [[services.metrics]]
  name = "wallet_count"
  url = "/wallets"
  path = "/total"
"#,
        )
        .unwrap();
        let metrics = ScrapeMetrics::register(&Registry::new()).unwrap();

        let forwarders = build_forwarders(&config, &metrics).unwrap();
        let names: Vec<&str> = forwarders.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["node", "wallet"]);
    }

    #[test]
    fn no_services_no_forwarders() {
        let config = Config::parse("").unwrap();
        let metrics = ScrapeMetrics::register(&Registry::new()).unwrap();
        assert!(build_forwarders(&config, &metrics).unwrap().is_empty());
    }
}

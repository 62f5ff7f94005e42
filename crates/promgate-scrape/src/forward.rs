//! Scraper for services that already expose text exposition.

use std::time::{Duration, Instant};

use promgate_core::{ServiceConfig, KEY_LABEL_INSTANCE, KEY_LABEL_JOB};
use promgate_exposition::fill_missing_labels;
use tracing::debug;

use crate::client::fetch;
use crate::error::{ScrapeError, ScrapeResult};
use crate::metrics::ScrapeMetrics;
use crate::{BoxFuture, Forwarder, DEFAULT_TIMEOUT};

/// Fetches a remote exposition and gives its series the service identity
/// labels they lack. A `job` or `instance` set by the remote is kept.
pub struct ExpositionScraper {
    service: String,
    instance: String,
    url: String,
    timeout: Duration,
    metrics: ScrapeMetrics,
}

impl ExpositionScraper {
    pub fn new(service: &ServiceConfig, metrics: ScrapeMetrics) -> ScrapeResult<Self> {
        let url = service
            .forward_url()
            .ok_or_else(|| ScrapeError::InvalidRequest {
                url: service.base_url(),
                reason: format!("service {} has no metrics_path", service.name),
            })?;

        Ok(Self {
            service: service.name.clone(),
            instance: service.instance(),
            url,
            timeout: service.timeout().unwrap_or(DEFAULT_TIMEOUT),
            metrics,
        })
    }

    pub async fn scrape(&self) -> ScrapeResult<Vec<u8>> {
        let body = fetch("GET", &self.url, self.timeout).await?;
        let labeled = fill_missing_labels(
            &body,
            &[
                (KEY_LABEL_JOB, self.service.as_str()),
                (KEY_LABEL_INSTANCE, self.instance.as_str()),
            ],
        )?;
        debug!(service = %self.service, bytes = labeled.len(), "exposition forwarded");
        Ok(labeled)
    }
}

impl Forwarder for ExpositionScraper {
    fn name(&self) -> &str {
        &self.service
    }

    fn get_metric(&self) -> BoxFuture<'_, ScrapeResult<Vec<u8>>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.scrape().await;
            self.metrics
                .observe_scrape(&self.service, started.elapsed(), result.is_ok());
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum::Router;
    use promgate_core::Config;
    use promgate_exposition::parse;
    use prometheus::Registry;

    use super::*;
    use crate::test_support::serve;

    fn forward_config(port: u16) -> Config {
        Config::parse(&format!(
            r#"
[[services]]
name = "node"
mode = "forward"
host = "127.0.0.1"
port = {port}
metrics_path = "/metrics"
timeout = "1s"
"#
        ))
        .unwrap()
    }

    fn scraper(port: u16) -> ExpositionScraper {
        let metrics = ScrapeMetrics::register(&Registry::new()).unwrap();
        ExpositionScraper::new(&forward_config(port).services[0], metrics).unwrap()
    }

    #[tokio::test]
    async fn forwards_with_identity_labels() {
        let router = Router::new().route(
            "/metrics",
            get(|| async {
                "# TYPE node_load1 gauge\n\
                 node_load1 0.5\n\
                 up{job=\"custom\",instance=\"x:1\"} 1\n"
            }),
        );
        let addr = serve(router).await;

        let body = scraper(addr.port()).scrape().await.unwrap();
        let families = parse(&body).unwrap();

        let load = &families["node_load1"].metrics[0];
        assert_eq!(load.label("job"), Some("node"));
        assert_eq!(
            load.label("instance"),
            Some(format!("127.0.0.1:{}", addr.port()).as_str())
        );

        let up = &families["up"].metrics[0];
        assert_eq!(up.label("job"), Some("custom"));
        assert_eq!(up.label("instance"), Some("x:1"));
    }

    #[tokio::test]
    async fn remote_job_without_instance_gets_only_instance() {
        let router = Router::new().route("/metrics", get(|| async { "up{job=\"custom\"} 1\n" }));
        let addr = serve(router).await;

        let body = scraper(addr.port()).scrape().await.unwrap();
        let text = String::from_utf8(body.clone()).unwrap();
        assert_eq!(text.matches("job=").count(), 1);

        let families = parse(&body).unwrap();
        let up = &families["up"].metrics[0];
        assert_eq!(up.labels.len(), 2);
        assert_eq!(up.label("job"), Some("custom"));
        assert_eq!(
            up.label("instance"),
            Some(format!("127.0.0.1:{}", addr.port()).as_str())
        );
    }

    #[tokio::test]
    async fn malformed_remote_exposition_is_an_error() {
        let router = Router::new().route("/metrics", get(|| async { "broken{ 1\n" }));
        let addr = serve(router).await;

        let err = scraper(addr.port()).scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Exposition(_)));
    }

    #[tokio::test]
    async fn unreachable_remote_is_an_error() {
        let err = scraper(1).get_metric().await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::Upstream { .. } | ScrapeError::Timeout { .. }
        ));
    }
}

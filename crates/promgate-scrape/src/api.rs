//! Scraper for JSON API services.
//!
//! Every configured metric names an endpoint and the paths to read from
//! its JSON response. One scrape fetches each distinct endpoint once,
//! extracts every definition, and renders the result as exposition text
//! labeled with the service identity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use promgate_core::{MetricKind, ServiceConfig, KEY_LABEL_INSTANCE, KEY_LABEL_JOB};
use promgate_exposition::{encode, LabelPair, Metric, MetricFamilies, MetricFamily, MetricType};
use promgate_extract::{MetricSource, MetricVal};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::fetch;
use crate::error::{ScrapeError, ScrapeResult};
use crate::metrics::ScrapeMetrics;
use crate::{BoxFuture, Forwarder, DEFAULT_TIMEOUT};

/// One configured metric, ready to extract.
#[derive(Debug, Clone)]
struct Definition {
    name: String,
    kind: MetricKind,
    help: String,
    method: String,
    url: String,
    source: MetricSource,
}

pub struct ApiScraper {
    service: String,
    instance: String,
    timeout: Duration,
    definitions: Vec<Definition>,
    metrics: ScrapeMetrics,
}

impl ApiScraper {
    pub fn new(service: &ServiceConfig, metrics: ScrapeMetrics) -> ScrapeResult<Self> {
        let definitions = service
            .metrics
            .iter()
            .map(|metric| {
                let source =
                    MetricSource::from_config(metric).map_err(|source| ScrapeError::Extract {
                        metric: metric.name.clone(),
                        source,
                    })?;
                Ok(Definition {
                    name: metric.name.clone(),
                    kind: metric.kind,
                    help: metric.description.clone(),
                    method: metric.http_method.to_uppercase(),
                    url: service.metric_url(metric),
                    source,
                })
            })
            .collect::<ScrapeResult<Vec<_>>>()?;

        Ok(Self {
            service: service.name.clone(),
            instance: service.instance(),
            timeout: service.timeout().unwrap_or(DEFAULT_TIMEOUT),
            definitions,
            metrics,
        })
    }

    /// Fetch, extract and render every definition.
    ///
    /// A definition that cannot be extracted is logged and left out. The
    /// scrape fails only when no endpoint could be fetched at all.
    pub async fn scrape(&self) -> ScrapeResult<Vec<u8>> {
        let mut documents: HashMap<(&str, &str), Option<Value>> = HashMap::new();
        let mut first_error = None;
        let mut families = MetricFamilies::new();

        for def in &self.definitions {
            let key = (def.method.as_str(), def.url.as_str());
            if !documents.contains_key(&key) {
                let document = match self.fetch_document(def).await {
                    Ok(document) => Some(document),
                    Err(e) => {
                        warn!(service = %self.service, url = %def.url, error = %e, "cannot fetch metric endpoint");
                        first_error.get_or_insert(e);
                        None
                    }
                };
                documents.insert(key, document);
            }

            let Some(Some(document)) = documents.get(&key) else {
                self.metrics.extract_failed(&self.service, &def.name);
                continue;
            };

            match def.source.extract(document) {
                Ok(values) if values.is_empty() => {
                    debug!(service = %self.service, metric = %def.name, "collection is empty");
                }
                Ok(values) => {
                    families.insert(def.name.clone(), self.family(def, values));
                }
                Err(e) => {
                    warn!(service = %self.service, metric = %def.name, error = %e, "cannot extract metric");
                    self.metrics.extract_failed(&self.service, &def.name);
                }
            }
        }

        if documents.values().all(Option::is_none) {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        debug!(
            service = %self.service,
            endpoints = documents.len(),
            families = families.len(),
            "api scrape complete"
        );
        Ok(encode(&families)?)
    }

    async fn fetch_document(&self, def: &Definition) -> ScrapeResult<Value> {
        let body = fetch(&def.method, &def.url, self.timeout).await?;
        serde_json::from_slice(&body).map_err(|source| ScrapeError::InvalidJson {
            url: def.url.clone(),
            source,
        })
    }

    fn family(&self, def: &Definition, values: Vec<MetricVal>) -> MetricFamily {
        let metric_type = match def.kind {
            MetricKind::Gauge => MetricType::Gauge,
            MetricKind::Counter => MetricType::Counter,
        };
        let mut family = MetricFamily::new(&def.name, metric_type);
        if !def.help.is_empty() {
            family.help = Some(def.help.clone());
        }

        let label_names = def.source.label_names();
        for value in values {
            let mut labels = vec![
                LabelPair::new(KEY_LABEL_JOB, &self.service),
                LabelPair::new(KEY_LABEL_INSTANCE, &self.instance),
            ];
            labels.extend(
                label_names
                    .iter()
                    .zip(value.labels)
                    .map(|(name, label_value)| LabelPair::new(*name, label_value)),
            );
            family.metrics.push(Metric::simple(labels, value.val));
        }
        family
    }
}

impl Forwarder for ApiScraper {
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

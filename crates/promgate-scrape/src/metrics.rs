//! Self metrics about scraping, exposed through the local registry.

use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Counters and timings for every upstream source.
///
/// Cheap to clone; clones share the same underlying series.
#[derive(Clone)]
pub struct ScrapeMetrics {
    pub(crate) scrapes: IntCounterVec,
    pub(crate) scrape_errors: IntCounterVec,
    pub(crate) scrape_duration: HistogramVec,
    pub(crate) extract_errors: IntCounterVec,
}

impl ScrapeMetrics {
    /// Create the collectors and register them with `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let scrapes = IntCounterVec::new(
            Opts::new("promgate_scrapes_total", "Total scrapes per upstream source."),
            &["source"],
        )?;
        let scrape_errors = IntCounterVec::new(
            Opts::new(
                "promgate_scrape_errors_total",
                "Total failed scrapes per upstream source.",
            ),
            &["source"],
        )?;
        let scrape_duration = HistogramVec::new(
            HistogramOpts::new(
                "promgate_scrape_duration_seconds",
                "Time spent scraping an upstream source.",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["source"],
        )?;
        let extract_errors = IntCounterVec::new(
            Opts::new(
                "promgate_extract_errors_total",
                "Metric definitions that could not be extracted from a response.",
            ),
            &["source", "metric"],
        )?;

        registry.register(Box::new(scrapes.clone()))?;
        registry.register(Box::new(scrape_errors.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(extract_errors.clone()))?;

        Ok(Self {
            scrapes,
            scrape_errors,
            scrape_duration,
            extract_errors,
        })
    }

    /// Record one finished scrape of `source`.
    pub fn observe_scrape(&self, source: &str, elapsed: Duration, ok: bool) {
        self.scrapes.with_label_values(&[source]).inc();
        self.scrape_duration
            .with_label_values(&[source])
            .observe(elapsed.as_secs_f64());
        if !ok {
            self.scrape_errors.with_label_values(&[source]).inc();
        }
    }

    pub fn extract_failed(&self, source: &str, metric: &str) {
        self.extract_errors.with_label_values(&[source, metric]).inc();
    }
}

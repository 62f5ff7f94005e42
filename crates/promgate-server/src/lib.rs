//! promgate-server — HTTP surface of the proxy.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `<handler_path>` | Local registry merged with every forwarder |
//!
//! # Request flow
//!
//! ```text
//! GET /metrics
//!   ├── fetch_local() ── oneshot ──▶ registry router (gzip) ── gunzip
//!   │     └── apply_default_labels(job=program, instance=listen|Host)
//!   ├── collect_forwarders() ── tokio::spawn per forwarder, join all
//!   │     └── failures logged and skipped
//!   └── merge_all([local, forwarded])
//!         ├── Ok  → 200 text/plain
//!         └── Err → 500
//! ```

pub mod error;
pub mod handlers;
pub mod local;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::Registry;
use promgate_core::Config;
use promgate_scrape::{build_forwarders, Forwarder, ScrapeMetrics};
use tower_http::compression::CompressionLayer;
use tracing::info;

pub use error::{ServerError, ServerResult};

/// Shared state for the aggregated endpoint.
#[derive(Clone)]
pub struct AppState {
    /// Router serving the local registry.
    pub local: Router,
    pub forwarders: Arc<[Arc<dyn Forwarder>]>,
    /// `job` label of self-reported metrics.
    pub program_name: String,
    /// `instance` label of self-reported metrics; the request `Host`
    /// header is used when unset.
    pub listen_address: Option<String>,
}

impl AppState {
    /// Create the local registry and every forwarder from `config`.
    pub fn from_config(config: &Config) -> ServerResult<Self> {
        let registry = local_registry()?;
        let metrics = ScrapeMetrics::register(&registry)?;
        let forwarders = build_forwarders(config, &metrics)?;
        info!(
            program = %config.program_name,
            forwarders = forwarders.len(),
            "aggregation state ready"
        );

        Ok(Self {
            local: local::registry_router(registry),
            forwarders: forwarders.into(),
            program_name: config.program_name.clone(),
            listen_address: config.instance_label(),
        })
    }
}

/// Registry for the proxy's own metrics, with process metrics where the
/// platform supports them.
pub fn local_registry() -> ServerResult<Registry> {
    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;
    Ok(registry)
}

/// Build the router exposing the aggregated endpoint at `handler_path`.
pub fn build_router(state: AppState, handler_path: &str) -> Router {
    Router::new()
        .route(handler_path, get(handlers::aggregated_metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}

//! The aggregated metrics endpoint.
//!
//! Each request scrapes the local registry in-process, tags it with the
//! proxy's own identity, polls every forwarder concurrently and merges
//! the lot into one exposition.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use promgate_core::{KEY_LABEL_INSTANCE, KEY_LABEL_JOB};
use promgate_exposition::{apply_default_labels, merge_all, TEXT_CONTENT_TYPE};
use promgate_scrape::Forwarder;
use tracing::{debug, error, warn};

use crate::local::fetch_local;
use crate::AppState;

/// GET <handler_path>
pub async fn aggregated_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // ── Local ──────────────────────────────────────────────────────

    let instance = state
        .listen_address
        .clone()
        .or_else(|| {
            headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let local = match fetch_local(&state.local, &headers).await {
        Ok(raw) => {
            let defaults = [
                (KEY_LABEL_JOB, state.program_name.as_str()),
                (KEY_LABEL_INSTANCE, instance.as_str()),
            ];
            match apply_default_labels(&raw, &defaults) {
                Ok(labeled) => labeled,
                Err(e) => {
                    error!(error = %e, "cannot label local metrics, continuing without them");
                    Vec::new()
                }
            }
        }
        Err(e) => {
            error!(error = %e, "cannot read local metrics, continuing without them");
            Vec::new()
        }
    };

    // ── Forwarders ─────────────────────────────────────────────────

    let forwarded = collect_forwarders(&state.forwarders).await;

    // ── Merge ──────────────────────────────────────────────────────

    match merge_all(&[local.as_slice(), forwarded.as_slice()]) {
        Ok(body) => {
            debug!(
                local = local.len(),
                forwarded = forwarded.len(),
                merged = body.len(),
                "metrics aggregated"
            );
            (StatusCode::OK, [(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            error!(error = %e, "cannot merge metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Run every forwarder as its own task and concatenate the successful
/// outputs in forwarder order. Failed or panicked forwarders are skipped.
pub async fn collect_forwarders(forwarders: &[Arc<dyn Forwarder>]) -> Vec<u8> {
    let tasks: Vec<_> = forwarders
        .iter()
        .map(|forwarder| {
            let forwarder = Arc::clone(forwarder);
            let name = forwarder.name().to_string();
            let task = tokio::spawn(async move { forwarder.get_metric().await });
            (name, task)
        })
        .collect();

    let mut combined = Vec::new();
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(bytes)) => {
                debug!(forwarder = %name, bytes = bytes.len(), "forwarder answered");
                combined.extend_from_slice(&bytes);
                if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                    combined.push(b'\n');
                }
            }
            Ok(Err(e)) => {
                warn!(forwarder = %name, error = %e, "forwarder failed, skipping");
            }
            Err(e) => {
                error!(forwarder = %name, error = %e, "forwarder task aborted, skipping");
            }
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use promgate_scrape::{BoxFuture, ScrapeError, ScrapeResult};

    struct Fixed(&'static str, &'static str);

    impl Forwarder for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn get_metric(&self) -> BoxFuture<'_, ScrapeResult<Vec<u8>>> {
            let body = self.1.as_bytes().to_vec();
            Box::pin(async move { Ok(body) })
        }
    }

    struct Failing;

    impl Forwarder for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn get_metric(&self) -> BoxFuture<'_, ScrapeResult<Vec<u8>>> {
            Box::pin(async {
                Err(ScrapeError::Upstream {
                    url: "http://127.0.0.1:1/metrics".to_string(),
                    reason: "connection refused".to_string(),
                })
            })
        }
    }

    struct Panicking;

    impl Forwarder for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn get_metric(&self) -> BoxFuture<'_, ScrapeResult<Vec<u8>>> {
            Box::pin(async { explode() })
        }
    }

    fn explode() -> ScrapeResult<Vec<u8>> {
        panic!("forwarder bug")
    }

    #[tokio::test]
    async fn concatenates_in_forwarder_order() {
        let forwarders: Vec<Arc<dyn Forwarder>> = vec![
            Arc::new(Fixed("a", "a_metric 1\n")),
            Arc::new(Fixed("b", "b_metric 2")),
            Arc::new(Fixed("c", "c_metric 3\n")),
        ];
        let combined = collect_forwarders(&forwarders).await;
        assert_eq!(combined, b"a_metric 1\nb_metric 2\nc_metric 3\n");
    }

    #[tokio::test]
    async fn failures_are_skipped() {
        let forwarders: Vec<Arc<dyn Forwarder>> = vec![
            Arc::new(Failing),
            Arc::new(Fixed("ok", "ok_metric 1\n")),
            Arc::new(Panicking),
        ];
        let combined = collect_forwarders(&forwarders).await;
        assert_eq!(combined, b"ok_metric 1\n");
    }

    #[tokio::test]
    async fn no_forwarders_no_bytes() {
        assert!(collect_forwarders(&[]).await.is_empty());
    }
}

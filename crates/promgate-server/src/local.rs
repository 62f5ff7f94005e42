//! The process's own registry, served as a regular router.
//!
//! The aggregated endpoint scrapes it in-process through the same
//! middleware a remote client would hit, compression included.

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use promgate_exposition::TEXT_CONTENT_TYPE;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;
use tracing::{debug, error};

use crate::error::{ServerError, ServerResult};

/// Path of the registry route inside the local router.
pub const LOCAL_PATH: &str = "/metrics";

/// Build the registry router. The registry is created once at startup
/// and shared with everything that registers collectors into it.
pub fn registry_router(registry: Registry) -> Router {
    Router::new()
        .route(LOCAL_PATH, get(render_registry))
        .layer(CompressionLayer::new())
        .with_state(registry)
}

/// GET /metrics
async fn render_registry(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&registry.gather(), &mut buf) {
        Ok(()) => (StatusCode::OK, [(CONTENT_TYPE, TEXT_CONTENT_TYPE)], buf).into_response(),
        Err(e) => {
            error!(error = %e, "cannot encode local registry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Scrape the local router in-process.
///
/// The caller's `Accept-Encoding` is passed through, so a gzip-capable
/// client makes the registry answer compressed; the body is returned
/// decompressed either way.
pub async fn fetch_local(local: &Router, headers: &HeaderMap) -> ServerResult<Vec<u8>> {
    let mut request = Request::builder().uri(LOCAL_PATH);
    if let Some(encoding) = headers.get(ACCEPT_ENCODING) {
        request = request.header(ACCEPT_ENCODING, encoding);
    }
    let request = request
        .body(Body::empty())
        .map_err(|e| ServerError::LocalBody(e.to_string()))?;

    let response = match local.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if !response.status().is_success() {
        return Err(ServerError::LocalStatus(response.status()));
    }

    let gzipped = response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| ServerError::LocalBody(e.to_string()))?;

    debug!(bytes = body.len(), gzipped, "local exposition fetched");
    if gzipped {
        promgate_scrape::gunzip(&body).map_err(ServerError::Decompress)
    } else {
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use prometheus::IntCounter;

    fn registry() -> Registry {
        let registry = Registry::new();
        let counter = IntCounter::new("local_events_total", "Events seen locally.").unwrap();
        counter.inc_by(3);
        registry.register(Box::new(counter)).unwrap();
        registry
    }

    #[tokio::test]
    async fn fetch_plain() {
        let router = registry_router(registry());
        let body = fetch_local(&router, &HeaderMap::new()).await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("# TYPE local_events_total counter"));
        assert!(text.contains("local_events_total 3"));
    }

    #[tokio::test]
    async fn fetch_negotiated_gzip_is_decompressed() {
        let router = registry_router(registry());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let body = fetch_local(&router, &headers).await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("local_events_total 3"));
    }

    #[tokio::test]
    async fn registry_route_compresses_for_gzip_clients() {
        let router = registry_router(registry());
        let request = Request::builder()
            .uri(LOCAL_PATH)
            .header(ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    }

    #[tokio::test]
    async fn missing_route_is_an_error() {
        let router = Router::new();
        let err = fetch_local(&router, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::LocalStatus(StatusCode::NOT_FOUND)));
    }
}

//! Minimal HTTP/1 client for upstream requests.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HOST, USER_AGENT};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};

const AGENT: &str = concat!("promgate/", env!("CARGO_PKG_VERSION"));

/// Perform one request and return the (decompressed) response body.
///
/// Only plain `http` URLs are supported. The whole exchange, connect
/// included, must finish within `timeout`.
pub async fn fetch(method: &str, url: &str, timeout: Duration) -> ScrapeResult<Vec<u8>> {
    let invalid = |reason: String| ScrapeError::InvalidRequest {
        url: url.to_string(),
        reason,
    };

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
    if uri.scheme_str() != Some("http") {
        return Err(invalid(format!(
            "unsupported scheme {:?}",
            uri.scheme_str().unwrap_or_default()
        )));
    }
    let authority = uri
        .authority()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
    let method = Method::from_bytes(method.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, authority.as_str())
        .header(USER_AGENT, AGENT)
        .header(ACCEPT_ENCODING, "gzip")
        .body(Empty::<Bytes>::new())
        .map_err(|e| invalid(e.to_string()))?;

    match tokio::time::timeout(timeout, send(&address, url, request)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%url, ?timeout, "upstream request timed out");
            Err(ScrapeError::Timeout {
                url: url.to_string(),
                timeout,
            })
        }
    }
}

async fn send(address: &str, url: &str, request: Request<Empty<Bytes>>) -> ScrapeResult<Vec<u8>> {
    let upstream = |reason: String| ScrapeError::Upstream {
        url: url.to_string(),
        reason,
    };

    let stream = TcpStream::connect(address).await.map_err(|e| {
        debug!(error = %e, %url, "upstream connection failed");
        upstream(e.to_string())
    })?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| upstream(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "upstream connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| upstream(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        debug!(%status, %url, "upstream non-2xx");
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let gzipped = response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| upstream(e.to_string()))?
        .to_bytes();

    if gzipped {
        gunzip(&body).map_err(|source| ScrapeError::Decompress {
            url: url.to_string(),
            source,
        })
    } else {
        Ok(body.to_vec())
    }
}

/// Decompress a gzip payload.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gzip, serve};
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;

    fn upstream() -> Router {
        Router::new()
            .route("/plain", get(|| async { "hello" }))
            .route(
                "/gzip",
                get(|| async { ([(header::CONTENT_ENCODING, "gzip")], gzip(b"zipped")) }),
            )
            .route(
                "/down",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
    }

    #[tokio::test]
    async fn fetch_plain_body() {
        let addr = serve(upstream()).await;
        let body = fetch("GET", &format!("http://{addr}/plain"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn fetch_gzip_body_is_decompressed() {
        let addr = serve(upstream()).await;
        let body = fetch("GET", &format!("http://{addr}/gzip"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(body, b"zipped");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let addr = serve(upstream()).await;
        let err = fetch("GET", &format!("http://{addr}/down"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let addr = serve(upstream()).await;
        let err = fetch("GET", &format!("http://{addr}/slow"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn closed_port_is_upstream_error() {
        let err = fetch("GET", "http://127.0.0.1:1/metrics", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::Upstream { .. } | ScrapeError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn rejects_unsupported_requests() {
        let timeout = Duration::from_millis(100);
        assert!(matches!(
            fetch("GET", "https://example.com/x", timeout).await,
            Err(ScrapeError::InvalidRequest { .. })
        ));
        assert!(matches!(
            fetch("GET", "not a url", timeout).await,
            Err(ScrapeError::InvalidRequest { .. })
        ));
        assert!(matches!(
            fetch("BAD METHOD", "http://127.0.0.1:1/", timeout).await,
            Err(ScrapeError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn gunzip_rejects_garbage() {
        assert!(gunzip(b"definitely not gzip").is_err());
        assert_eq!(gunzip(&gzip(b"abc")).unwrap(), b"abc");
    }
}

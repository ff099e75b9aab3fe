use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// URLs are supported for now: {0}")]
    OnlyHttpSupported(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
    /// Estimated bytes sent on the wire (HTTP/1.1 request line + headers).
    pub bytes_sent: u64,
    /// Estimated bytes received on the wire (HTTP/1.1 status line + headers + body).
    pub bytes_received: u64,
    /// Time from sending the request to draining the response body.
    pub duration: Duration,
}

impl Response {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// HTTP-level failure: any 4xx or 5xx status.
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}

/// Something that can perform an HTTP request. The load generator is generic
/// over this so tests can drive it with a canned transport.
pub trait Transport: Send + Sync + 'static {
    fn perform(
        &self,
        method: http::Method,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        let inner = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { inner }
    }
}

impl Transport for HttpClient {
    async fn perform(
        &self,
        method: http::Method,
        url: &str,
        timeout: Duration,
    ) -> Result<Response> {
        let parsed = url::Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(Error::OnlyHttpSupported(url.to_string()));
        }

        let uri: hyper::Uri = url
            .parse()
            .map_err(|_| Error::InvalidUrl(url.to_string()))?;

        let bytes_sent = estimate_request_bytes(&method, &uri, &parsed);

        let mut builder = Request::builder().method(method).uri(uri);
        // Make the implicit Host header explicit so byte accounting is
        // deterministic.
        if let Some(host) = host_header_value(&parsed) {
            builder = builder.header(http::header::HOST, host);
        }
        let req: Request<Full<Bytes>> = builder.body(Full::new(Bytes::new()))?;

        let started = Instant::now();
        let res: hyper::Response<Incoming> =
            match tokio::time::timeout(timeout, self.inner.request(req)).await {
                Ok(res) => res?,
                Err(_) => return Err(Error::Timeout(timeout)),
            };

        let (parts, body) = res.into_parts();
        let status = parts.status.as_u16();
        let head_bytes = estimate_response_head_bytes(parts.version, parts.status, &parts.headers);

        let body = match tokio::time::timeout(timeout.saturating_sub(started.elapsed()), body.collect())
            .await
        {
            Ok(body) => body?.to_bytes(),
            Err(_) => return Err(Error::Timeout(timeout)),
        };
        let duration = started.elapsed();
        let bytes_received = head_bytes.saturating_add(body.len() as u64);

        Ok(Response {
            status,
            body,
            bytes_sent,
            bytes_received,
            duration,
        })
    }
}

/// Best-effort estimate of HTTP/1.1 request framing: request line + Host
/// header + terminating CRLF. Requests carry no body.
fn estimate_request_bytes(method: &http::Method, uri: &hyper::Uri, parsed: &url::Url) -> u64 {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    // "METHOD SP path SP HTTP/1.1 CRLF"
    let mut bytes = (method.as_str().len() as u64)
        .saturating_add(1)
        .saturating_add(path.len() as u64)
        .saturating_add(1)
        .saturating_add("HTTP/1.1".len() as u64)
        .saturating_add(2);

    if let Some(host) = host_header_value(parsed) {
        bytes = bytes.saturating_add(estimate_header_bytes(b"host", host.as_bytes()));
    }

    // End of headers.
    bytes.saturating_add(2)
}

fn estimate_response_head_bytes(
    version: http::Version,
    status: http::StatusCode,
    headers: &http::HeaderMap,
) -> u64 {
    // "HTTP/1.1 SP 200 SP reason CRLF"
    let version_len = match version {
        http::Version::HTTP_10 => "HTTP/1.0".len(),
        _ => "HTTP/1.1".len(),
    } as u64;
    let reason_len = status.canonical_reason().map(str::len).unwrap_or(0) as u64;
    let mut bytes = version_len
        .saturating_add(1)
        .saturating_add(3)
        .saturating_add(1)
        .saturating_add(reason_len)
        .saturating_add(2);

    for (name, value) in headers.iter() {
        bytes = bytes.saturating_add(estimate_header_bytes(
            name.as_str().as_bytes(),
            value.as_bytes(),
        ));
    }
    bytes.saturating_add(2)
}

fn estimate_header_bytes(name: &[u8], value: &[u8]) -> u64 {
    // "name: value CRLF"
    (name.len() as u64)
        .saturating_add(2)
        .saturating_add(value.len() as u64)
        .saturating_add(2)
}

fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_includes_non_default_port() {
        let url = match url::Url::parse("http://localhost:8080/health") {
            Ok(u) => u,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(host_header_value(&url), Some("localhost:8080".to_string()));
    }

    #[test]
    fn host_header_omits_default_port() {
        let url = match url::Url::parse("http://example.com/") {
            Ok(u) => u,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(host_header_value(&url), Some("example.com".to_string()));
    }

    #[test]
    fn request_byte_estimate_counts_line_host_and_crlf() {
        let url = match url::Url::parse("http://example.com/health?x=1") {
            Ok(u) => u,
            Err(err) => panic!("{err}"),
        };
        let uri: hyper::Uri = match "http://example.com/health?x=1".parse() {
            Ok(u) => u,
            Err(err) => panic!("{err}"),
        };
        // "GET /health?x=1 HTTP/1.1\r\n" = 26
        // "host: example.com\r\n" = 19
        // "\r\n" = 2
        let n = estimate_request_bytes(&http::Method::GET, &uri, &url);
        assert_eq!(n, 26 + 19 + 2);
    }
}

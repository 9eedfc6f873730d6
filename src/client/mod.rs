//! Single-shot HTTP requests bounded by a dial timeout and a deadline.
//!
//! # Data Flow
//! ```text
//! request(method, url, body, content_type, deadline, dial_timeout)
//!     → build http::Request (Content-Type only, empty method means GET)
//!     → fresh hyper-util client over TimedConnector
//!         → dial within `dial`, TLS for https, arm `deadline` on the socket
//!     → send, await head
//!         → 3xx with Location: follow, at most MAX_REDIRECTS hops
//!     → drain body
//!     → RawResponse { status, body } or RequestError
//! ```
//!
//! # Design Decisions
//! - One attempt per call; retry policy belongs to the caller
//! - A new client per call, nothing shared between callers
//! - The deadline lives on the connection, so it covers the body drain too
//! - The request body is buffered so 307/308 can replay it

pub mod blocking;
pub mod connector;
pub mod content_type;
pub mod error;
pub mod tls;

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{ClientConfig, TransportConfig};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

pub use connector::{ConnectError, DeadlineElapsed, DeadlineStream, TimedConnector, Timeouts};
pub use error::{RequestError, RequestResult};

/// Fully drained response of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn into_parts(self) -> (Bytes, u16) {
        let code = self.status.as_u16();
        (self.body, code)
    }
}

/// Request helper carrying timeouts and transport settings.
#[derive(Debug, Clone, Default)]
pub struct TimedClient {
    config: ClientConfig,
}

impl TimedClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The configured dial and deadline bounds.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts::new(self.config.timeouts.deadline(), self.config.timeouts.dial())
    }

    /// Send one request using the configured timeouts.
    pub async fn send(
        &self,
        method: &str,
        url: &str,
        body: impl Into<Body>,
        content_type: &str,
    ) -> RequestResult<RawResponse> {
        self.send_with(method, url, body, content_type, self.timeouts())
            .await
    }

    /// Send one request with explicit timeouts.
    pub async fn send_with(
        &self,
        method: &str,
        url: &str,
        body: impl Into<Body>,
        content_type: &str,
        timeouts: Timeouts,
    ) -> RequestResult<RawResponse> {
        let mut method = parse_method(method)?;
        let mut uri = url.parse::<Uri>().map_err(axum::http::Error::from)?;
        let mut payload = axum::body::to_bytes(body.into(), usize::MAX)
            .await
            .map_err(RequestError::RequestBody)?;

        tracing::debug!(
            method = %method,
            url = %uri,
            dial = ?timeouts.dial,
            deadline = ?timeouts.deadline,
            "Sending request"
        );

        let client = build_client(&self.config.transport, timeouts)?;
        let mut hops = 0;

        let response = loop {
            let request = Request::builder()
                .method(method.clone())
                .uri(uri.clone())
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(payload.clone()))?;

            let response = client.request(request).await.map_err(|e| {
                let err = RequestError::Transport(e);
                tracing::warn!(url = %uri, error = %err, "Request failed");
                err
            })?;

            let status = response.status();
            let Some(next) = redirect_target(&uri, status, response.headers())? else {
                break response;
            };

            hops += 1;
            if hops > MAX_REDIRECTS {
                tracing::warn!(url = %url, hops = MAX_REDIRECTS, "Redirect limit reached");
                return Err(RequestError::TooManyRedirects(MAX_REDIRECTS));
            }

            if matches!(
                status,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            ) && method != Method::HEAD
            {
                method = Method::GET;
                payload = Bytes::new();
            }

            tracing::debug!(from = %uri, to = %next, status = %status, "Following redirect");
            uri = next;
        };

        let status = response.status();
        let limit = self.config.transport.max_body_bytes.unwrap_or(usize::MAX);
        let body = axum::body::to_bytes(Body::new(response.into_body()), limit)
            .await
            .map_err(|e| {
                let err = RequestError::Body(e);
                tracing::warn!(url = %uri, status = %status, error = %err, "Failed to drain response body");
                err
            })?;

        tracing::debug!(
            url = %uri,
            status = %status,
            bytes = body.len(),
            "Request completed"
        );

        Ok(RawResponse { status, body })
    }
}

/// An empty method means GET.
fn parse_method(method: &str) -> RequestResult<Method> {
    if method.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(method.as_bytes()).map_err(|e| RequestError::Build(e.into()))
}

/// Where a redirect response points, resolved against the current URL.
///
/// `None` for non-redirect statuses and for redirects without a `Location`.
fn redirect_target(current: &Uri, status: StatusCode, headers: &HeaderMap) -> RequestResult<Option<Uri>> {
    if !matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return Ok(None);
    }
    let Some(location) = headers.get(header::LOCATION) else {
        return Ok(None);
    };

    let location = String::from_utf8_lossy(location.as_bytes()).into_owned();
    let next = url::Url::parse(&current.to_string())
        .and_then(|base| base.join(&location))
        .map_err(|source| RequestError::InvalidRedirect {
            location: location.clone(),
            source,
        })?;

    Ok(Some(next.as_str().parse::<Uri>().map_err(axum::http::Error::from)?))
}

fn build_client(
    transport: &TransportConfig,
    timeouts: Timeouts,
) -> RequestResult<Client<TimedConnector, Body>> {
    let tls = tls::connector(transport.ca_file.as_deref()).map_err(RequestError::Tls)?;
    let mut connector = TimedConnector::new(timeouts, tls);
    connector.set_nodelay(transport.nodelay);

    Ok(Client::builder(TokioExecutor::new()).build(connector))
}

/// Send a single HTTP request.
///
/// The connection must be established within `dial_timeout`; from then on
/// every read and write is bounded by `deadline`. Only `Content-Type` is set.
/// Redirects are followed up to [`MAX_REDIRECTS`] hops, each on a connection
/// with its own deadline.
pub async fn request(
    method: &str,
    url: &str,
    body: impl Into<Body>,
    content_type: &str,
    deadline: Duration,
    dial_timeout: Duration,
) -> RequestResult<RawResponse> {
    TimedClient::new(ClientConfig::with_timeouts(deadline, dial_timeout))
        .send(method, url, body, content_type)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_parts() {
        let response = RawResponse {
            status: StatusCode::CREATED,
            body: Bytes::from_static(b"made"),
        };
        assert_eq!(response.status_code(), 201);
        assert_eq!(response.into_parts(), (Bytes::from_static(b"made"), 201));
    }

    #[test]
    fn client_exposes_configured_timeouts() {
        let client = TimedClient::new(ClientConfig::with_timeouts(
            Duration::from_secs(3),
            Duration::from_millis(400),
        ));
        assert_eq!(
            client.timeouts(),
            Timeouts {
                dial: Duration::from_millis(400),
                deadline: Duration::from_secs(3),
            }
        );
    }

    #[tokio::test]
    async fn malformed_url_fails_before_dialing() {
        let err = request(
            "GET",
            "http://exa mple.com/",
            Body::empty(),
            content_type::JSON,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn empty_method_means_get() {
        assert_eq!(parse_method("").unwrap(), Method::GET);
        assert_eq!(parse_method("PUT").unwrap(), Method::PUT);
        assert!(parse_method("NOT A METHOD").unwrap_err().is_builder());
    }

    #[test]
    fn redirect_targets_resolve_against_current_url() {
        let current: Uri = "http://example.com/a/b?q=1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, "../c".parse().unwrap());

        let next = redirect_target(&current, StatusCode::FOUND, &headers).unwrap();
        assert_eq!(next, Some("http://example.com/c".parse().unwrap()));

        headers.insert(header::LOCATION, "https://other.test:8443/x".parse().unwrap());
        let next = redirect_target(&current, StatusCode::PERMANENT_REDIRECT, &headers).unwrap();
        assert_eq!(next, Some("https://other.test:8443/x".parse().unwrap()));

        assert_eq!(redirect_target(&current, StatusCode::OK, &headers).unwrap(), None);
        assert_eq!(
            redirect_target(&current, StatusCode::FOUND, &HeaderMap::new()).unwrap(),
            None
        );
    }

    #[test]
    fn unparseable_location_is_reported() {
        let current: Uri = "http://example.com/".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, "http://[::1".parse().unwrap());

        match redirect_target(&current, StatusCode::FOUND, &headers) {
            Err(RequestError::InvalidRedirect { location, .. }) => assert_eq!(location, "http://[::1"),
            other => panic!("expected invalid redirect, got {:?}", other),
        }
    }
}

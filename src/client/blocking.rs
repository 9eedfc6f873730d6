//! Blocking variant of the request helper.
//!
//! Each call spins up a current-thread Tokio runtime, drives the request to
//! completion and tears the runtime down again. Calling these from a thread
//! that is already inside a runtime returns [`RequestError::InsideRuntime`].

use std::time::Duration;

use axum::body::Body;

use crate::client::{RawResponse, RequestError, RequestResult, TimedClient, Timeouts};
use crate::config::ClientConfig;

/// Blocking form of [`crate::client::request`].
pub fn request(
    method: &str,
    url: &str,
    body: impl Into<Body>,
    content_type: &str,
    deadline: Duration,
    dial_timeout: Duration,
) -> RequestResult<RawResponse> {
    let client = TimedClient::new(ClientConfig::with_timeouts(deadline, dial_timeout));
    send_with(&client, method, url, body, content_type, client.timeouts())
}

/// Blocking form of [`TimedClient::send_with`].
pub fn send_with(
    client: &TimedClient,
    method: &str,
    url: &str,
    body: impl Into<Body>,
    content_type: &str,
    timeouts: Timeouts,
) -> RequestResult<RawResponse> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(RequestError::InsideRuntime);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(RequestError::Runtime)?;

    runtime.block_on(client.send_with(method, url, body, content_type, timeouts))
}

//! Request errors.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::client::connector::{ConnectError, DeadlineElapsed};
use crate::client::tls::TlsSetupError;

/// Result type for request operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// Error returned by a single request attempt.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Method, URL or header value could not form a request.
    #[error("invalid request: {0}")]
    Build(#[from] axum::http::Error),

    /// Connecting, sending, or receiving the response head failed.
    #[error("request failed: {}", describe(.0))]
    Transport(#[source] hyper_util::client::legacy::Error),

    /// The response head arrived but draining the body failed.
    #[error("failed to read response body: {}", describe(.0))]
    Body(#[source] axum::Error),

    /// The caller's body could not be buffered before sending.
    #[error("failed to read request body: {}", describe(.0))]
    RequestBody(#[source] axum::Error),

    /// The TLS client configuration could not be built.
    #[error("TLS setup failed: {0}")]
    Tls(#[source] TlsSetupError),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    #[error("invalid redirect location '{location}': {source}")]
    InvalidRedirect {
        location: String,
        #[source]
        source: url::ParseError,
    },

    /// The blocking helper could not start its runtime.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),

    /// A blocking helper was called on a thread already driving a runtime.
    #[error("blocking request called from inside an async runtime")]
    InsideRuntime,
}

impl RequestError {
    /// The request never left the process because it was malformed.
    pub fn is_builder(&self) -> bool {
        matches!(self, RequestError::Build(_))
    }

    /// The connect phase failed (scheme, host, refused, or dial timeout).
    pub fn is_connect(&self) -> bool {
        self.connect_error().is_some()
    }

    /// Either the dial timeout or the connection deadline expired.
    pub fn is_timeout(&self) -> bool {
        if self.connect_error().is_some_and(ConnectError::is_timeout) {
            return true;
        }
        self.causes().any(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
        })
    }

    /// The connect-phase error at the root of this failure, if any.
    pub fn connect_error(&self) -> Option<&ConnectError> {
        self.causes().find_map(|cause| cause.downcast_ref::<ConnectError>())
    }

    /// The elapsed deadline behind this failure, if any.
    pub fn deadline_elapsed(&self) -> Option<DeadlineElapsed> {
        self.causes().find_map(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .and_then(io::Error::get_ref)
                .and_then(|inner| inner.downcast_ref::<DeadlineElapsed>())
                .copied()
        })
    }

    fn causes(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        let first: Option<&(dyn StdError + 'static)> = match self {
            RequestError::Build(e) => Some(e),
            RequestError::Transport(e) => Some(e),
            RequestError::Body(e) | RequestError::RequestBody(e) => Some(e),
            RequestError::Tls(e) => Some(e),
            RequestError::InvalidRedirect { source, .. } => Some(source),
            RequestError::Runtime(e) => Some(e),
            RequestError::TooManyRedirects(_) | RequestError::InsideRuntime => None,
        };
        std::iter::successors(first, |&e| e.source())
    }
}

/// Render an error with its causes, skipping repeats of the parent text.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

//! Connection establishment with a dial timeout and a post-connect deadline.
//!
//! # Responsibilities
//! - Resolve and dial the target within the dial timeout
//! - Start the deadline clock once the socket is connected
//! - Run the TLS handshake for `https` targets
//! - Fail every read and write after the deadline with `TimedOut`
//!
//! # Design Decisions
//! - The deadline is a single `Sleep` armed at connect time, polled before
//!   each I/O operation, so it registers the waker alongside the socket
//! - TLS runs on top of the deadline stream, so the handshake counts
//!   against the deadline
//! - Shutdown is never refused, so a timed-out connection can still close
//! - Only `http` and `https`; other schemes fail in the connect phase

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::Sleep;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Dial and deadline bounds for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on name resolution plus TCP connect.
    pub dial: Duration,
    /// Bound on everything after the connection is up.
    pub deadline: Duration,
}

impl Timeouts {
    pub fn new(deadline: Duration, dial: Duration) -> Self {
        Self { dial, deadline }
    }
}

/// Failure during the connect phase.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unsupported scheme '{0}', only http and https are supported")]
    UnsupportedScheme(String),

    #[error("request URL has no host")]
    MissingHost,

    #[error("'{0}' is not a valid TLS server name")]
    InvalidServerName(String),

    #[error("dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("TLS handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: io::Error,
    },
}

impl ConnectError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ConnectError::DialTimeout(_) => true,
            ConnectError::Handshake { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Carried inside the `TimedOut` I/O error raised once the deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection deadline of {after:?} elapsed")]
pub struct DeadlineElapsed {
    pub after: Duration,
}

/// Stream wrapper enforcing an absolute deadline on all reads and writes.
pub struct DeadlineStream<S> {
    inner: S,
    deadline: Pin<Box<Sleep>>,
    budget: Duration,
}

impl<S> DeadlineStream<S> {
    /// Arm the deadline `budget` from now.
    pub fn new(inner: S, budget: Duration) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep(budget)),
            budget,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    fn check_deadline(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        match self.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                DeadlineElapsed { after: self.budget },
            )),
            Poll::Pending => Ok(()),
        }
    }
}

impl<S> fmt::Debug for DeadlineStream<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineStream")
            .field("inner", &self.inner)
            .field("budget", &self.budget)
            .finish()
    }
}

impl<S> AsyncRead for DeadlineStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.check_deadline(cx)?;
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S> AsyncWrite for DeadlineStream<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.check_deadline(cx)?;
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.check_deadline(cx)?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Plain or TLS stream, both under the connection deadline.
enum MaybeTls {
    Plain(DeadlineStream<TcpStream>),
    Tls(Box<TlsStream<DeadlineStream<TcpStream>>>),
}

impl fmt::Debug for MaybeTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeTls::Plain(s) => f.debug_tuple("Plain").field(s).finish(),
            MaybeTls::Tls(s) => f.debug_tuple("Tls").field(s.get_ref().0).finish(),
        }
    }
}

impl AsyncRead for MaybeTls {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTls {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A dialed connection as handed to hyper.
#[derive(Debug)]
pub struct TimedConnection(TokioIo<MaybeTls>);

impl hyper::rt::Read for TimedConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.get_mut().0), cx, buf)
    }
}

impl hyper::rt::Write for TimedConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.get_mut().0), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.get_mut().0), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.get_mut().0), cx)
    }
}

impl Connection for TimedConnection {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

/// Connector applying [`Timeouts`] to every connection it dials.
#[derive(Clone)]
pub struct TimedConnector {
    timeouts: Timeouts,
    nodelay: bool,
    tls: TlsConnector,
}

impl fmt::Debug for TimedConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedConnector")
            .field("timeouts", &self.timeouts)
            .field("nodelay", &self.nodelay)
            .finish_non_exhaustive()
    }
}

impl TimedConnector {
    pub fn new(timeouts: Timeouts, tls: TlsConnector) -> Self {
        Self {
            timeouts,
            nodelay: true,
            tls,
        }
    }

    pub fn set_nodelay(&mut self, nodelay: bool) {
        self.nodelay = nodelay;
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

impl tower::Service<Uri> for TimedConnector {
    type Response = TimedConnection;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<TimedConnection, ConnectError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.dial(dst).await })
    }
}

impl TimedConnector {
    async fn dial(self, dst: Uri) -> Result<TimedConnection, ConnectError> {
        let secure = match dst.scheme_str() {
            Some("http") | None => false,
            Some("https") => true,
            Some(other) => return Err(ConnectError::UnsupportedScheme(other.to_string())),
        };

        let host = dst
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or(ConnectError::MissingHost)?;
        let port = dst.port_u16().unwrap_or(if secure { 443 } else { 80 });
        let addr = format!("{}:{}", host, port);

        let stream = connect_within(&addr, self.timeouts.dial, TcpStream::connect((host, port))).await?;

        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let stream = DeadlineStream::new(stream, self.timeouts.deadline);
        tracing::trace!(
            addr = %addr,
            deadline = ?self.timeouts.deadline,
            tls = secure,
            "Connected, deadline armed"
        );

        if !secure {
            return Ok(TimedConnection(TokioIo::new(MaybeTls::Plain(stream))));
        }

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| ConnectError::InvalidServerName(host.to_string()))?;
        let tls = self
            .tls
            .connect(server_name, stream)
            .await
            .map_err(|source| ConnectError::Handshake { addr, source })?;

        Ok(TimedConnection(TokioIo::new(MaybeTls::Tls(Box::new(tls)))))
    }
}

/// Bound a connect attempt by `dial`.
async fn connect_within<S, F>(addr: &str, dial: Duration, connect: F) -> Result<S, ConnectError>
where
    F: Future<Output = io::Result<S>>,
{
    match tokio::time::timeout(dial, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ConnectError::Dial {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ConnectError::DialTimeout(dial)),
    }
}

//! Timed HTTP requests and uniform JSON response envelopes.
//!
//! - [`client`]: one HTTP request, bounded by a dial timeout and a
//!   post-connect deadline, returning the drained body and status.
//! - [`http`]: the `{"Code","Message","Data"}` envelope handlers return.

pub mod client;
pub mod config;
pub mod http;
pub mod observability;

pub use client::{content_type, request, RawResponse, RequestError, TimedClient, Timeouts};
pub use config::ClientConfig;
pub use http::Envelope;

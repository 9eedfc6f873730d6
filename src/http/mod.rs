//! HTTP handler helpers.
//!
//! Handlers build an [`Envelope`], optionally fill its payload or record an
//! error, and return it. The transport status is always 200.

pub mod response;

pub use response::{Envelope, Payload, ERROR_CODE, SUCCESS_CODE, SUCCESS_MESSAGE};

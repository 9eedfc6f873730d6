//! Observability subsystem.
//!
//! The library emits `tracing` events (request start, dial, failures,
//! envelope serialization problems); applications decide where they go.
//! `logging::init` is the stock subscriber setup for binaries and tests.

pub mod logging;

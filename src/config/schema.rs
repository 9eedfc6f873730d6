//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the timed HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Dial and deadline bounds applied to each request.
    pub timeouts: TimeoutConfig,

    /// Socket, TLS and body settings.
    pub transport: TransportConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl ClientConfig {
    /// Configuration with the given bounds and default transport settings.
    pub fn with_timeouts(deadline: Duration, dial: Duration) -> Self {
        Self {
            timeouts: TimeoutConfig {
                dial_ms: duration_to_millis(dial),
                deadline_ms: duration_to_millis(deadline),
            },
            ..Self::default()
        }
    }
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment bound (name resolution included) in milliseconds.
    pub dial_ms: u64,

    /// Bound on all reads and writes after the connection is up, in milliseconds.
    pub deadline_ms: u64,
}

impl TimeoutConfig {
    pub fn dial(&self) -> Duration {
        Duration::from_millis(self.dial_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_ms: 5_000,
            deadline_ms: 30_000,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Set `TCP_NODELAY` on dialed sockets.
    pub nodelay: bool,

    /// Upper bound on a drained response body. Unbounded when unset.
    pub max_body_bytes: Option<usize>,

    /// Extra PEM bundle trusted for `https`, on top of the webpki roots.
    pub ca_file: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            max_body_bytes: None,
            ca_file: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

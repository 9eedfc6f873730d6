//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges. All errors are
//! collected rather than stopping at the first one.

use thiserror::Error;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timeouts.{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("transport.max_body_bytes must be greater than zero when set")]
    ZeroBodyLimit,

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.dial_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "dial_ms" });
    }
    if config.timeouts.deadline_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "deadline_ms" });
    }
    if config.transport.max_body_bytes == Some(0) {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Common error types shared by the resilience core and the transport layer
//!
//! The error handling system is built on two pieces:
//!
//! 1. **[`TransportError`]**: the transport-level failure (connect, DNS,
//!    timeout, malformed request) as seen by the executor. Transport crates
//!    convert their native errors into this type so the retry policy and the
//!    circuit breaker can classify failures without depending on a specific
//!    HTTP stack.
//!
//! 2. **[`ErrorClassification`]**: a standard interface for classifying
//!    errors by how the resilience layer must treat them.
//!
//! ## Circuit failure vs. caller failure
//!
//! | Error | Circuit failure | Retried by presets |
//! |-------|-----------------|--------------------|
//! | Transport (connect / timeout) | yes | no |
//! | HTTP 5xx | yes | yes (idempotent methods) |
//! | HTTP 4xx | no | no |
//! | Breaker rejection | no | no |

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// TCP/TLS connection could not be established (includes DNS failures)
    Connect,
    /// The attempt exceeded its deadline
    Timeout,
    /// The request could not be built or sent
    Request,
    /// The response body could not be read
    Body,
    /// Anything the transport could not categorise
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// A failure that happened below HTTP: no status code was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport {kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Create a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Connection-level failure (refused, reset, DNS).
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Attempt deadline exceeded.
    pub fn timeout(after: Duration) -> Self {
        Self::new(TransportErrorKind::Timeout, format!("no response within {after:?}"))
    }

    /// Request construction or send failure.
    pub fn request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Request, message)
    }

    /// Response body read failure.
    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        // Network errors surface immediately; only HTTP 5xx responses are
        // retried by the preset policies.
        false
    }

    fn is_circuit_failure(&self) -> bool {
        true
    }
}

/// Trait for classifying errors the way the resilience layer consumes them
///
/// # Example
///
/// ```rust,ignore
/// impl ErrorClassification for MyError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, Self::Unavailable)
///     }
///
///     fn is_circuit_failure(&self) -> bool {
///         matches!(self, Self::Unavailable | Self::Network(_))
///     }
/// }
/// ```
pub trait ErrorClassification {
    /// Whether the default retry presets would retry after this error.
    fn is_retryable(&self) -> bool;

    /// Whether this error counts against the circuit breaker's error
    /// percentage.
    fn is_circuit_failure(&self) -> bool;
}

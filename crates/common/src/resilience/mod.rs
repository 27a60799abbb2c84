//! Resilience patterns for generated API clients
//!
//! This module provides the two shared building blocks every generated
//! operation call runs through:
//! - **Retry policy**: decides whether a completed attempt is retried and how
//!   long to wait before the next one
//! - **Circuit breaker**: per-service rolling health with CLOSED / OPEN /
//!   HALF_OPEN phases and a concurrency cap
//!
//! Breakers are shared through a [`CircuitRegistry`] keyed by service name,
//! and a [`HealthReporter`] writes their counters to a
//! [`CallLogger`](crate::observability::CallLogger) on a fixed interval.
//!
//! Both are driven by the request executor in `tollgate-infra`; nothing here
//! performs I/O.

pub mod circuit_breaker;
pub mod clock;
pub mod constants;
pub mod health;
pub mod registry;
pub mod reporter;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CallOutcome, CircuitBreaker, CircuitConfig, CircuitConfigBuilder, CircuitHealth,
    CircuitPermit, CircuitRejection, CircuitState, ConfigError, ConfigResult,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use health::{RollingCounts, RollingEvent, RollingWindow};
pub use registry::CircuitRegistry;
pub use reporter::HealthReporter;
// Re-export retry types
pub use retry::{
    is_retryable_server_error, AttemptContext, ExponentialRetry, FnRetryPolicy, NoRetry,
    RetryPolicy, RetryPreset, SingleRetry, UnknownRetryPreset,
};

//! Resilience core shared by the Tollgate generated API clients.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all Tollgate components.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: transport error types and serde helpers
//! - `runtime`: retry policies, circuit breakers, health reporting, call
//!   logging and tracing abstractions
//! - `test-utils`: recording loggers/tracers and the mock clock

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod observability;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, TransportError, TransportErrorKind};
#[cfg(feature = "runtime")]
pub use observability::{AttemptRecord, CallLogger, TraceSpan, Tracer, TracingCallLogger};
#[cfg(feature = "runtime")]
pub use resilience::{
    AttemptContext, CallOutcome, CircuitBreaker, CircuitConfig, CircuitHealth, CircuitPermit,
    CircuitRegistry, CircuitRejection, CircuitState, Clock, HealthReporter, MockClock,
    RetryPolicy, RetryPreset, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;

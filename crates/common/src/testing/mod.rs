//! Testing utilities and helpers
//!
//! - **[`mocks`]**: recording implementations of [`CallLogger`] and
//!   [`Tracer`]
//! - [`MockClock`] re-exported for driving circuit breaker time
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tollgate_common::resilience::{CallOutcome, CircuitBreaker, CircuitConfig};
//! use tollgate_common::testing::MockClock;
//!
//! let clock = MockClock::new();
//! let config = CircuitConfig::builder().force_closed(false).build().unwrap();
//! let breaker = CircuitBreaker::with_clock("petstore", config, clock.clone()).unwrap();
//! for _ in 0..20 {
//!     breaker.record_outcome(CallOutcome::Failure);
//! }
//! assert!(breaker.admit().is_err());
//!
//! clock.advance(Duration::from_secs(5));
//! assert!(breaker.admit().is_ok());
//! ```
//!
//! [`CallLogger`]: crate::observability::CallLogger
//! [`Tracer`]: crate::observability::Tracer

pub mod mocks;

pub use mocks::{RecordingCallLogger, RecordingTracer};

pub use crate::resilience::clock::MockClock;

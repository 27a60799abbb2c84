//! Request execution core shared by every generated client
//!
//! A generated operation describes itself as an [`OperationRequest`], the
//! [`RequestExecutor`] runs it under the service's circuit breaker and retry
//! policy, and [`RawResponse`] classifies the final status into the
//! operation's success model or typed error.
//!
//! # Architecture
//!
//! - [`ClientBuilder`] validates options and wires executor, breaker, transport
//! - One [`CircuitBreaker`](tollgate_common::resilience::CircuitBreaker) per
//!   service name, shared through a
//!   [`CircuitRegistry`](tollgate_common::resilience::CircuitRegistry)
//! - Every attempt is admitted, bounded by a timeout, recorded and logged
//! - Backoff sleeps never hold a concurrency slot

pub mod client;
pub mod discovery;
pub mod errors;
pub mod executor;
pub mod request;
pub mod response;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use discovery::{DiscoveryError, EndpointVariant, ServiceDiscovery, StaticDiscovery};
pub use errors::{CallError, ClientBuildError, ExecuteError};
pub use executor::RequestExecutor;
pub use request::{OperationRequest, RequestError};
pub use response::RawResponse;

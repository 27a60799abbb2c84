//! # Tollgate Infrastructure
//!
//! The I/O half of Tollgate: HTTP transport, the request executor that
//! generated clients call into, configuration loading and log setup.
//!
//! This crate contains:
//! - `reqwest` transport behind the [`Transport`](http::Transport) seam
//! - Request executor combining circuit breaker, retries and timeouts
//! - Client builder, service discovery hook and typed call errors
//! - Env/file configuration loader
//! - The generated petstore sample client
//!
//! ## Architecture
//! - Resilience primitives live in `tollgate-common`; this crate drives them
//! - Schema models and operation errors come from `tollgate-domain`
//! - Contains all "impure" code (network, files, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod samples;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use api::{CallError, Client, ClientBuilder, ExecuteError, OperationRequest, RawResponse};
pub use config::ClientConfig;
pub use http::{HttpTransport, Transport};
pub use samples::PetstoreClient;

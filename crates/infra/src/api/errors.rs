//! API-specific error types
//!
//! Three layers, matching where a call can fail:
//!
//! - [`ClientBuildError`]: the client could not be constructed
//! - [`ExecuteError`]: the executor produced no response (rejected by the
//!   breaker, transport failure, malformed request)
//! - [`CallError`]: what a generated operation returns; adds the typed
//!   per-operation error, undeclared statuses and body decode failures

use reqwest::StatusCode;
use thiserror::Error;
use tollgate_common::error::TransportError;
use tollgate_common::resilience::{CircuitRejection, ConfigError};
use tollgate_domain::ValidationError;

use super::discovery::DiscoveryError;
use super::request::RequestError;

/// Construction errors, returned synchronously from the client builder
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("either an address or service discovery is required")]
    MissingEndpoint,

    #[error("address and service discovery are mutually exclusive")]
    ConflictingEndpoint,

    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid circuit configuration: {0}")]
    Circuit(#[from] ConfigError),

    #[error("circuit '{service}' is already registered with a different configuration")]
    ConflictingCircuitConfig { service: String },

    #[error("service discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// Why the executor produced no response
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("circuit for '{service}' is open")]
    OpenCircuit { service: String },

    #[error("'{service}' rejected the command: {max_concurrent} requests already in flight")]
    CommandRejected { service: String, max_concurrent: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

impl ExecuteError {
    /// Rejected by the circuit breaker without a network attempt
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::OpenCircuit { .. } | Self::CommandRejected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

impl From<CircuitRejection> for ExecuteError {
    fn from(rejection: CircuitRejection) -> Self {
        match rejection {
            CircuitRejection::OpenCircuit { service } => Self::OpenCircuit { service },
            CircuitRejection::CommandRejected { service, max_concurrent } => {
                Self::CommandRejected { service, max_concurrent }
            }
        }
    }
}

/// Result error of one generated operation, `E` being its typed error enum
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// A status the operation declares, with its decoded payload
    #[error("{0}")]
    Operation(E),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("failed to decode {status} response body: {source}")]
    Decode {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

impl<E> CallError<E> {
    /// The typed operation error, if the service answered with a declared
    /// status
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<StatusCode>
    where
        E: tollgate_domain::OperationError,
    {
        match self {
            Self::Operation(err) => StatusCode::from_u16(err.status()).ok(),
            Self::UnexpectedStatus { status, .. } | Self::Decode { status, .. } => Some(*status),
            Self::Validation(_) | Self::Execute(_) => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Execute(err) if err.is_rejection())
    }
}

impl<E> From<RequestError> for CallError<E> {
    fn from(err: RequestError) -> Self {
        Self::Execute(ExecuteError::InvalidRequest(err))
    }
}

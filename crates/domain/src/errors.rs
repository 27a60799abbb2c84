//! Error payloads and typed per-operation errors
//!
//! Every operation declares the non-success statuses it knows about. A
//! declared status is turned into a variant of that operation's error enum,
//! carrying the decoded response body; any other non-success status is
//! reported generically by the executor.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::declare_operation_errors;

/// Error payload returned by the service for declared failure statuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code, when the service sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Typed error of one operation, built from a declared HTTP status
pub trait OperationError: std::error::Error + Send + Sync + Sized + 'static {
    /// Operation identifier, as named in the API description
    const OPERATION: &'static str;

    /// Statuses that have a typed variant
    fn declared_statuses() -> &'static [u16];

    /// Build the variant for `status` from the response body.
    ///
    /// `None` when the status is not declared; `Some(Err(_))` when it is
    /// declared but the body does not match the payload type.
    fn from_status(status: u16, body: &[u8]) -> Option<Result<Self, serde_json::Error>>;

    /// Status this error was built from
    fn status(&self) -> u16;
}

/// A string did not name any variant of a schema enum
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Caller-side input rejected before any request is sent
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ValidationError {
    #[error("required field '{0}' is empty")]
    EmptyField(String),

    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange { field: String, min: u32, max: u32, actual: u32 },
}

// ============================================================================
// Petstore operations
// ============================================================================

declare_operation_errors! {
    /// Errors declared by `GET /pets`
    pub enum ListPetsError for "listPets" {
        400 => BadRequest(ErrorBody) : "invalid list query",
    }
}

declare_operation_errors! {
    /// Errors declared by `GET /pets/{petId}`
    pub enum GetPetError for "getPet" {
        400 => BadRequest(ErrorBody) : "invalid pet id",
        404 => NotFound(ErrorBody) : "pet not found",
    }
}

declare_operation_errors! {
    /// Errors declared by `POST /pets`
    pub enum CreatePetError for "createPet" {
        409 => Conflict(ErrorBody) : "pet already exists",
        422 => InvalidPet(ErrorBody) : "pet rejected",
    }
}

declare_operation_errors! {
    /// Errors declared by `PATCH /pets/{petId}`
    pub enum UpdatePetError for "updatePet" {
        404 => NotFound(ErrorBody) : "pet not found",
        422 => InvalidPet(ErrorBody) : "pet rejected",
    }
}

declare_operation_errors! {
    /// Errors declared by `DELETE /pets/{petId}`
    pub enum DeletePetError for "deletePet" {
        404 => NotFound(ErrorBody) : "pet not found",
    }
}

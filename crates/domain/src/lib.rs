//! # Tollgate Domain
//!
//! Schema models and typed operation errors of the sample petstore API.
//!
//! This crate contains:
//! - Request/response models (`Pet`, `NewPet`, `PetPage`, ...)
//! - The error payload and one typed error enum per operation
//! - Macros the generated glue uses for schema enums and operation errors
//!
//! ## Architecture
//! - No dependencies on other Tollgate crates
//! - Only external dependencies allowed
//! - Pure data structures; no I/O

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

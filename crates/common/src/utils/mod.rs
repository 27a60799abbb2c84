//! Common utility functions
//!
//! - **[`serde`]**: Serialization helpers for configuration durations

pub mod serde;

// Re-export commonly used items for convenience
pub use self::serde::duration_millis;

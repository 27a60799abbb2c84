//! Macros for generated operation glue
//!
//! Two pieces of boilerplate every generated client repeats:
//!
//! - [`impl_status_conversions!`](crate::impl_status_conversions): `Display`
//!   and case-insensitive `FromStr` for string enums in the API schema.
//! - [`declare_operation_errors!`](crate::declare_operation_errors): one typed
//!   error enum per operation, with one variant per declared HTTP status
//!   carrying the deserialized payload.
//!
//! # Example
//!
//! ```rust
//! use tollgate_domain::{declare_operation_errors, ErrorBody, OperationError};
//!
//! declare_operation_errors! {
//!     /// Errors declared by `DELETE /orders/{orderId}`
//!     pub enum CancelOrderError for "cancelOrder" {
//!         404 => NotFound(ErrorBody) : "order not found",
//!         409 => AlreadyShipped(ErrorBody) : "order already shipped",
//!     }
//! }
//!
//! let err = CancelOrderError::from_status(404, br#"{"message":"no order 7"}"#)
//!     .expect("404 is declared")
//!     .expect("payload decodes");
//! assert_eq!(err.status(), 404);
//! assert!(CancelOrderError::from_status(500, b"").is_none());
//! ```

/// Implements Display and FromStr for schema string enums
///
/// - Display: the wire representation
/// - FromStr: case-insensitive parse of the wire representation
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::UnknownVariant {
                        kind: stringify!($enum_name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// Declares a per-operation error enum and its
/// [`OperationError`](crate::errors::OperationError) implementation
///
/// Each arm maps a declared status to a variant and the payload type the
/// response body is decoded into.
#[macro_export]
macro_rules! declare_operation_errors {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident for $operation:literal {
            $($status:literal => $variant:ident($payload:ty) : $description:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $(
                #[doc = $description]
                $variant($payload),
            )+
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant(payload) => {
                        write!(f, "{} ({}): {}", $description, $status, payload)
                    })+
                }
            }
        }

        impl std::error::Error for $name {}

        impl $crate::errors::OperationError for $name {
            const OPERATION: &'static str = $operation;

            fn declared_statuses() -> &'static [u16] {
                &[$($status),+]
            }

            fn from_status(
                status: u16,
                body: &[u8],
            ) -> Option<Result<Self, $crate::__private::serde_json::Error>> {
                match status {
                    $($status => Some(
                        $crate::__private::serde_json::from_slice::<$payload>(body)
                            .map(Self::$variant),
                    ),)+
                    _ => None,
                }
            }

            fn status(&self) -> u16 {
                match self {
                    $(Self::$variant(_) => $status,)+
                }
            }
        }
    };
}

//! Conversions from external transport errors into the executor's error type.

use reqwest::Error as HttpError;
use tollgate_common::error::{TransportError, TransportErrorKind};

/// Extension trait to make the conversion logic explicit at call sites and
/// in tests.
pub trait IntoTransportError {
    fn into_transport(self) -> TransportError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl IntoTransportError for HttpError {
    fn into_transport(self) -> TransportError {
        TransportError::new(classify(&self), describe(&self))
    }
}

fn classify(err: &HttpError) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return TransportErrorKind::Connect;
        }
    }
    if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else if err.is_builder() || err.is_request() || err.is_redirect() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    }
}

/// reqwest's message (which names the URL) plus the innermost cause, which
/// usually names the real problem ("connection refused", "dns error").
fn describe(err: &HttpError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    let mut innermost = None;
    while let Some(cause) = source {
        innermost = Some(cause.to_string());
        source = cause.source();
    }
    if let Some(cause) = innermost {
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
    }
    message
}

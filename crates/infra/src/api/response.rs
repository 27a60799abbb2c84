//! Raw executor responses and status classification for generated glue

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tollgate_domain::OperationError;

use super::errors::CallError;

/// The final response of a logical call, after retries.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Transport attempts made, including the last one
    pub attempts: u32,
}

impl RawResponse {
    /// Classify the status and decode the success model.
    ///
    /// - a status in `success` decodes the body as `T`
    /// - a status `E` declares becomes the typed variant
    /// - anything else is [`CallError::UnexpectedStatus`]
    pub fn decode<T, E>(self, success: &[StatusCode]) -> Result<T, CallError<E>>
    where
        T: DeserializeOwned,
        E: OperationError,
    {
        let status = self.status;
        if success.contains(&status) {
            return serde_json::from_slice(&self.body)
                .map_err(|source| CallError::Decode { status, source });
        }
        Err(self.into_call_error())
    }

    /// Like [`decode`](Self::decode) for operations without a response model.
    pub fn decode_empty<E>(self, success: &[StatusCode]) -> Result<(), CallError<E>>
    where
        E: OperationError,
    {
        if success.contains(&self.status) {
            return Ok(());
        }
        Err(self.into_call_error())
    }

    fn into_call_error<E: OperationError>(self) -> CallError<E> {
        let status = self.status;
        match E::from_status(status.as_u16(), &self.body) {
            Some(Ok(err)) => CallError::Operation(err),
            Some(Err(source)) => CallError::Decode { status, source },
            None => CallError::UnexpectedStatus {
                status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            },
        }
    }
}

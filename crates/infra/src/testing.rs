//! Test doubles for the transport seam
//!
//! [`ScriptedTransport`] replays a fixed sequence of outcomes without any
//! network I/O, so executor tests can run under paused tokio time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::time::Instant;
use tollgate_common::error::TransportError;

use crate::http::{Transport, TransportRequest, TransportResponse};

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond { status: StatusCode, body: Vec<u8>, delay: Duration },
    Fail(TransportError),
}

impl Scripted {
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        match Self::status(status) {
            Self::Respond { status, delay, .. } => {
                Self::Respond { status, body: body.as_bytes().to_vec(), delay }
            }
            other => other,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Respond { status, body, .. } => Self::Respond { status, body, delay: by },
            other => other,
        }
    }
}

/// Transport that replays [`Scripted`] outcomes in order
///
/// Once the script runs out the last outcome repeats. Every request is
/// recorded together with the (tokio) instant it was sent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    last: Arc<Mutex<Option<Scripted>>>,
    sent: Arc<Mutex<Vec<(Instant, TransportRequest)>>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.sent.lock().iter().map(|(_, request)| request.clone()).collect()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Time elapsed between consecutive requests
    pub fn gaps(&self) -> Vec<Duration> {
        let sent = self.sent.lock();
        sent.windows(2).map(|pair| pair[1].0.duration_since(pair[0].0)).collect()
    }

    fn next(&self) -> Option<Scripted> {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                Some(outcome)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().push((Instant::now(), request));
        match self.next() {
            Some(Scripted::Respond { status, body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse::new(status, body))
            }
            Some(Scripted::Fail(err)) => Err(err),
            None => Err(TransportError::request("transport script is empty")),
        }
    }
}

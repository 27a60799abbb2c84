//! Mock implementations of common traits
//!
//! Provides recording sinks so tests can assert on what the executor logged
//! and traced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::observability::{AttemptRecord, CallLogger, SpanKind, TraceSpan, Tracer};
use crate::resilience::CircuitHealth;

/// Call logger that keeps every record in memory
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tollgate_common::observability::{AttemptRecord, CallLogger};
/// use tollgate_common::testing::RecordingCallLogger;
///
/// let logger = RecordingCallLogger::new();
/// logger.log_attempt(&AttemptRecord::response("petstore", "GET", "/pets", 1, 200, Duration::ZERO));
/// assert_eq!(logger.attempts().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingCallLogger {
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
    health: Arc<Mutex<Vec<CircuitHealth>>>,
}

impl RecordingCallLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt records in the order they were logged
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().clone()
    }

    /// Health records in the order they were logged
    pub fn health_records(&self) -> Vec<CircuitHealth> {
        self.health.lock().clone()
    }

    pub fn clear(&self) {
        self.attempts.lock().clear();
        self.health.lock().clear();
    }
}

impl CallLogger for RecordingCallLogger {
    fn log_attempt(&self, record: &AttemptRecord) {
        self.attempts.lock().push(record.clone());
    }

    fn log_health(&self, health: &CircuitHealth) {
        self.health.lock().push(health.clone());
    }
}

/// Tracer with fixed ids that remembers every span it started
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<TraceSpan>>>,
}

impl RecordingTracer {
    /// Trace id used for every span
    pub const TRACE_ID: &'static str = "4bf92f3577b34da6a3ce929d0e0e4736";
    /// Span id used for every span
    pub const SPAN_ID: &'static str = "00f067aa0ba902b7";

    pub fn new() -> Self {
        Self::default()
    }

    /// Operation names of started spans, in order
    pub fn operations(&self) -> Vec<String> {
        self.spans.lock().iter().map(|span| span.operation.clone()).collect()
    }

    /// The `traceparent` value every injected request carries
    pub fn expected_traceparent() -> String {
        format!("00-{}-{}-01", Self::TRACE_ID, Self::SPAN_ID)
    }
}

#[async_trait]
impl Tracer for RecordingTracer {
    async fn start_span(&self, operation: &str, metadata: HashMap<String, String>) -> TraceSpan {
        let span = TraceSpan {
            span_id: Self::SPAN_ID.to_string(),
            trace_id: Self::TRACE_ID.to_string(),
            operation: operation.to_string(),
            kind: SpanKind::Client,
            start_time: SystemTime::now(),
            metadata,
        };
        self.spans.lock().push(span.clone());
        span
    }

    fn current_span(&self) -> Option<TraceSpan> {
        self.spans.lock().last().cloned()
    }
}

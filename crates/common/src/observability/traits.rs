//! Trait abstractions for observability components
//!
//! Executors log through [`CallLogger`] and trace through [`Tracer`] without
//! depending on a specific backend. The default implementations write
//! `tracing` events.

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resilience::CircuitHealth;

/// Header carrying W3C trace context
pub const TRACEPARENT_HEADER: &str = "traceparent";

mod timestamp_ms {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::ser::Error as SerError;
    use serde::{Deserialize, Deserializer, Serializer};

    type SerializerResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(timestamp: &SystemTime, serializer: S) -> SerializerResult<S>
    where
        S: Serializer,
    {
        let duration = timestamp
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SerError::custom("timestamp predates unix epoch"))?;
        let millis = u64::try_from(duration.as_millis()).map_err(|_| {
            SerError::custom("timestamp does not fit into 64-bit millisecond representation")
        })?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

// ============================================================================
// Call Logging
// ============================================================================

/// Structured log sink for executor activity
pub trait CallLogger: Send + Sync + Debug {
    /// One record per completed attempt
    fn log_attempt(&self, record: &AttemptRecord);

    /// One record per health tick of a circuit breaker
    fn log_health(&self, health: &CircuitHealth);

    /// Check if logging is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// What happened during one transport attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Service (circuit) name
    pub backend: String,

    pub method: String,

    pub uri: String,

    /// 1-based attempt number within the call
    pub attempt: u32,

    /// Response status, absent on transport failure
    pub status: Option<u16>,

    /// Transport error text or a short status description
    pub message: String,

    pub latency_ms: u64,

    #[serde(with = "timestamp_ms")]
    pub timestamp: SystemTime,
}

impl AttemptRecord {
    /// Record for an attempt that produced an HTTP response.
    pub fn response(
        backend: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
        attempt: u32,
        status: u16,
        latency: Duration,
    ) -> Self {
        Self {
            backend: backend.into(),
            method: method.into(),
            uri: uri.into(),
            attempt,
            status: Some(status),
            message: format!("HTTP {status}"),
            latency_ms: duration_ms(latency),
            timestamp: SystemTime::now(),
        }
    }

    /// Record for an attempt that failed below HTTP.
    pub fn transport_failure(
        backend: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
        attempt: u32,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            backend: backend.into(),
            method: method.into(),
            uri: uri.into(),
            attempt,
            status: None,
            message: message.into(),
            latency_ms: duration_ms(latency),
            timestamp: SystemTime::now(),
        }
    }

    /// Transport failure or 5xx
    pub fn is_failure(&self) -> bool {
        !matches!(self.status, Some(status) if status < 500)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Distributed Tracing Traits
// ============================================================================

/// Trait for distributed tracing implementations
///
/// Allows components to create trace spans without depending on a specific
/// tracing implementation.
#[async_trait]
pub trait Tracer: Send + Sync + Debug {
    /// Start a new trace span
    async fn start_span(&self, operation: &str, metadata: HashMap<String, String>) -> TraceSpan;

    /// Get the current active span (if any)
    fn current_span(&self) -> Option<TraceSpan>;

    /// Write the span's context into outgoing request headers
    fn inject(&self, span: &TraceSpan, headers: &mut HashMap<String, String>) {
        headers.insert(TRACEPARENT_HEADER.to_string(), span.traceparent());
    }
}

/// Role of a span in a distributed trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    #[default]
    Internal,
    /// Outgoing request to another service
    Client,
}

/// Represents a trace span
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[must_use = "trace spans should be finished to record timing data"]
pub struct TraceSpan {
    /// Span ID (16 hex digits)
    pub span_id: String,

    /// Trace ID (32 hex digits)
    pub trace_id: String,

    /// Operation name
    pub operation: String,

    pub kind: SpanKind,

    /// Start timestamp
    #[serde(with = "timestamp_ms")]
    pub start_time: SystemTime,

    /// Span metadata
    pub metadata: HashMap<String, String>,
}

impl Default for TraceSpan {
    fn default() -> Self {
        Self {
            span_id: String::new(),
            trace_id: String::new(),
            operation: String::new(),
            kind: SpanKind::default(),
            start_time: UNIX_EPOCH,
            metadata: HashMap::new(),
        }
    }
}

impl TraceSpan {
    /// W3C `traceparent` value: version 00, sampled.
    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }

    /// Returns the elapsed time between span start and now.
    pub fn elapsed(&self) -> Option<Duration> {
        SystemTime::now().duration_since(self.start_time).ok()
    }

    /// Mark span as complete
    pub fn finish(self) {
        if let Some(elapsed) = self.elapsed() {
            tracing::trace!(
                span_id = %self.span_id,
                trace_id = %self.trace_id,
                operation = %self.operation,
                elapsed_ms = elapsed.as_millis(),
                "Trace span finished"
            );
        } else {
            tracing::trace!(
                span_id = %self.span_id,
                trace_id = %self.trace_id,
                operation = %self.operation,
                "Trace span finished (elapsed unavailable)"
            );
        }
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// Writes attempt and health records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallLogger;

impl CallLogger for TracingCallLogger {
    fn log_attempt(&self, record: &AttemptRecord) {
        if record.is_failure() {
            tracing::warn!(
                backend = %record.backend,
                method = %record.method,
                uri = %record.uri,
                attempt = record.attempt,
                status = record.status,
                latency_ms = record.latency_ms,
                "{}",
                record.message
            );
        } else {
            tracing::debug!(
                backend = %record.backend,
                method = %record.method,
                uri = %record.uri,
                attempt = record.attempt,
                status = record.status,
                latency_ms = record.latency_ms,
                "{}",
                record.message
            );
        }
    }

    fn log_health(&self, health: &CircuitHealth) {
        tracing::info!(
            backend = %health.service,
            state = %health.state,
            is_open = health.is_open,
            request_count = health.request_count,
            error_count = health.error_count,
            error_percentage = health.error_percentage,
            successes = health.successes,
            failures = health.failures,
            short_circuited = health.short_circuited,
            rejected = health.rejected,
            timeouts = health.timeouts,
            concurrent_requests = health.concurrent_requests,
            mean_latency_ms = health.mean_latency_ms,
            "circuit health"
        );
    }
}

/// No-op logger for when call logging is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallLogger;

impl CallLogger for NoOpCallLogger {
    fn log_attempt(&self, _record: &AttemptRecord) {}

    fn log_health(&self, _health: &CircuitHealth) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// No-op tracer for testing or when tracing is disabled
#[derive(Debug, Clone, Default)]
pub struct NoOpTracer;

#[async_trait]
impl Tracer for NoOpTracer {
    async fn start_span(&self, operation: &str, metadata: HashMap<String, String>) -> TraceSpan {
        TraceSpan {
            span_id: "noop".to_string(),
            trace_id: "noop".to_string(),
            operation: operation.to_string(),
            kind: SpanKind::Client,
            start_time: SystemTime::now(),
            metadata,
        }
    }

    fn current_span(&self) -> Option<TraceSpan> {
        None
    }

    fn inject(&self, _span: &TraceSpan, _headers: &mut HashMap<String, String>) {}
}

/// Tracer that mints random W3C ids and reports spans through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogTracer;

#[async_trait]
impl Tracer for LogTracer {
    async fn start_span(&self, operation: &str, metadata: HashMap<String, String>) -> TraceSpan {
        let trace_id = Uuid::new_v4().simple().to_string();
        let mut span_id = Uuid::new_v4().simple().to_string();
        span_id.truncate(16);

        tracing::trace!(%trace_id, %span_id, operation, "Trace span started");
        TraceSpan {
            span_id,
            trace_id,
            operation: operation.to_string(),
            kind: SpanKind::Client,
            start_time: SystemTime::now(),
            metadata,
        }
    }

    fn current_span(&self) -> Option<TraceSpan> {
        None
    }
}

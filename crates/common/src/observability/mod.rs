//! Observability primitives for request execution
//!
//! Trait abstractions for per-attempt call logging and distributed tracing,
//! with `tracing`-backed and no-op implementations. Subscriber setup lives in
//! `tollgate-infra`.

pub mod traits;

// Re-export trait abstractions
pub use traits::{
    AttemptRecord, CallLogger, LogTracer, NoOpCallLogger, NoOpTracer, SpanKind, TraceSpan, Tracer,
    TracingCallLogger, TRACEPARENT_HEADER,
};

//! Rolling outcome statistics for the circuit breaker
//!
//! Outcomes are counted into time buckets; buckets older than the window are
//! evicted on every access. The health decision only looks at requests that
//! actually reached the service (successes, failures, timeouts). Breaker
//! rejections are counted for observability but never affect the error
//! percentage.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// One event counted in the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingEvent {
    /// The call reached the service and was not a circuit failure
    Success,
    /// Transport error or 5xx response
    Failure,
    /// Transport timeout (a failure, counted separately)
    Timeout,
    /// Rejected because the breaker was open
    ShortCircuited,
    /// Rejected because the concurrency cap was reached
    Rejected,
}

/// Aggregated counts over the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RollingCounts {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub short_circuited: u64,
    pub rejected: u64,
    latency_total: Duration,
    latency_samples: u64,
}

impl RollingCounts {
    /// Requests that reached the service.
    pub fn request_count(&self) -> u64 {
        self.successes + self.failures + self.timeouts
    }

    /// Requests counted as circuit failures.
    pub fn error_count(&self) -> u64 {
        self.failures + self.timeouts
    }

    /// Error percentage in `0.0..=100.0`; zero when no requests were seen.
    pub fn error_percentage(&self) -> f64 {
        let total = self.request_count();
        if total == 0 {
            return 0.0;
        }
        self.error_count() as f64 * 100.0 / total as f64
    }

    /// Mean latency of completed requests.
    pub fn mean_latency(&self) -> Duration {
        if self.latency_samples == 0 {
            return Duration::ZERO;
        }
        let samples = u32::try_from(self.latency_samples).unwrap_or(u32::MAX);
        self.latency_total / samples
    }

    fn add(&mut self, other: &Self) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.short_circuited += other.short_circuited;
        self.rejected += other.rejected;
        self.latency_total += other.latency_total;
        self.latency_samples += other.latency_samples;
    }
}

#[derive(Debug)]
struct Bucket {
    started_at: Instant,
    counts: RollingCounts,
}

/// Time-bucketed counters over a sliding window.
#[derive(Debug)]
pub struct RollingWindow {
    window: Duration,
    bucket_duration: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    /// `bucket_count` is clamped to at least one bucket.
    pub fn new(window: Duration, bucket_count: u32) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            window,
            bucket_duration: window / bucket_count,
            buckets: VecDeque::with_capacity(bucket_count as usize),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count an event. `latency` is only meaningful for completed requests.
    pub fn record(&mut self, event: RollingEvent, latency: Option<Duration>, now: Instant) {
        self.evict(now);

        let bucket = match self.buckets.back_mut() {
            Some(back) if now.duration_since(back.started_at) < self.bucket_duration => back,
            _ => {
                self.buckets.push_back(Bucket { started_at: now, counts: RollingCounts::default() });
                // just pushed
                match self.buckets.back_mut() {
                    Some(back) => back,
                    None => return,
                }
            }
        };

        let counts = &mut bucket.counts;
        match event {
            RollingEvent::Success => counts.successes += 1,
            RollingEvent::Failure => counts.failures += 1,
            RollingEvent::Timeout => counts.timeouts += 1,
            RollingEvent::ShortCircuited => counts.short_circuited += 1,
            RollingEvent::Rejected => counts.rejected += 1,
        }
        if let Some(latency) = latency {
            counts.latency_total += latency;
            counts.latency_samples += 1;
        }
    }

    /// Sum of all live buckets.
    pub fn counts(&mut self, now: Instant) -> RollingCounts {
        self.evict(now);
        let mut total = RollingCounts::default();
        for bucket in &self.buckets {
            total.add(&bucket.counts);
        }
        total
    }

    /// Drop all buckets.
    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.started_at) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

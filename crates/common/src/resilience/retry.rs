//! Retry policies for generated operation calls
//!
//! A retry policy is an immutable strategy value with two operations:
//!
//! - [`RetryPolicy::backoffs`] returns the ordered delays inserted before each
//!   retry. Its length is the maximum number of retries; an empty sequence
//!   means "never retry".
//! - [`RetryPolicy::should_retry`] inspects one completed attempt and decides
//!   whether another attempt is wanted.
//!
//! The executor owns the loop; policies never sleep or count attempts
//! themselves. Policies are shared as `Arc<dyn RetryPolicy>` across calls and
//! clients.
//!
//! ## Presets
//!
//! | Preset | Backoffs | Eligible attempts |
//! |--------|----------|-------------------|
//! | [`NoRetry`] | none | none |
//! | [`SingleRetry`] | `[1000ms]` | no transport error, method not POST/PATCH, status >= 500 |
//! | [`ExponentialRetry`] | `100, 200, 400, 800, 1600ms` ±5% | same as Single |
//!
//! Transport errors (connect failures, timeouts) are never retried by the
//! presets: only HTTP 5xx responses are. Custom policies may choose otherwise.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    EXPONENTIAL_BASE_DELAY, EXPONENTIAL_JITTER_FACTOR, EXPONENTIAL_RETRIES, SINGLE_BACKOFF,
};
use crate::error::TransportError;

/// Description of one completed attempt, handed to the retry policy.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    /// HTTP method of the request
    pub method: &'a Method,
    /// Transport-level failure, when no response was received
    pub transport_error: Option<&'a TransportError>,
    /// Response status, when a response was received
    pub status: Option<StatusCode>,
    /// 1-based attempt number within the logical call
    pub attempt: u32,
}

impl<'a> AttemptContext<'a> {
    /// Context for an attempt that produced an HTTP response.
    pub fn response(method: &'a Method, status: StatusCode, attempt: u32) -> Self {
        Self { method, transport_error: None, status: Some(status), attempt }
    }

    /// Context for an attempt that failed below HTTP.
    pub fn transport_failure(method: &'a Method, error: &'a TransportError, attempt: u32) -> Self {
        Self { method, transport_error: Some(error), status: None, attempt }
    }
}

/// Strategy deciding whether and when a failed attempt is retried
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Delays before each retry, in order. The length is the retry budget.
    fn backoffs(&self) -> Vec<Duration>;

    /// Whether the attempt described by `context` should be retried.
    fn should_retry(&self, context: &AttemptContext<'_>) -> bool;
}

/// Eligibility rule shared by the Single and Exponential presets.
///
/// True only when a response arrived (no transport error), the method is
/// neither POST nor PATCH, and the status is a server error.
pub fn is_retryable_server_error(context: &AttemptContext<'_>) -> bool {
    if context.transport_error.is_some() {
        return false;
    }
    if *context.method == Method::POST || *context.method == Method::PATCH {
        return false;
    }
    context.status.is_some_and(|status| status.as_u16() >= 500)
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn backoffs(&self) -> Vec<Duration> {
        Vec::new()
    }

    fn should_retry(&self, _context: &AttemptContext<'_>) -> bool {
        false
    }
}

/// One retry after a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleRetry {
    delay: Duration,
}

impl SingleRetry {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SingleRetry {
    fn default() -> Self {
        Self::new(SINGLE_BACKOFF)
    }
}

impl RetryPolicy for SingleRetry {
    fn backoffs(&self) -> Vec<Duration> {
        vec![self.delay]
    }

    fn should_retry(&self, context: &AttemptContext<'_>) -> bool {
        is_retryable_server_error(context)
    }
}

/// Doubling delays with uniform jitter.
///
/// A fresh jittered sequence is drawn on every [`RetryPolicy::backoffs`]
/// call so concurrent calls do not retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialRetry {
    base_delay: Duration,
    retries: u32,
    jitter_factor: f64,
}

impl ExponentialRetry {
    /// Custom exponential policy. `jitter_factor` is clamped to `0.0..=1.0`;
    /// a NaN or infinite factor disables jitter.
    pub fn new(base_delay: Duration, retries: u32, jitter_factor: f64) -> Self {
        let jitter_factor =
            if jitter_factor.is_finite() { jitter_factor.clamp(0.0, 1.0) } else { 0.0 };
        Self { base_delay, retries, jitter_factor }
    }

    /// Delays before jitter is applied: `base * 2^n`.
    pub fn nominal_backoffs(&self) -> Vec<Duration> {
        (0..self.retries).map(|n| self.base_delay.saturating_mul(1u32 << n.min(31))).collect()
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    fn apply_jitter(&self, nominal: Duration, rng: &mut impl Rng) -> Duration {
        if self.jitter_factor == 0.0 {
            return nominal;
        }
        let offset = rng.gen_range(-self.jitter_factor..=self.jitter_factor);
        nominal.mul_f64(1.0 + offset)
    }
}

impl Default for ExponentialRetry {
    fn default() -> Self {
        Self::new(EXPONENTIAL_BASE_DELAY, EXPONENTIAL_RETRIES, EXPONENTIAL_JITTER_FACTOR)
    }
}

impl RetryPolicy for ExponentialRetry {
    fn backoffs(&self) -> Vec<Duration> {
        let mut rng = rand::thread_rng();
        self.nominal_backoffs().into_iter().map(|d| self.apply_jitter(d, &mut rng)).collect()
    }

    fn should_retry(&self, context: &AttemptContext<'_>) -> bool {
        is_retryable_server_error(context)
    }
}

/// Caller-supplied policy built from a backoff list and a predicate.
pub struct FnRetryPolicy<F> {
    backoffs: Vec<Duration>,
    predicate: F,
}

impl<F> FnRetryPolicy<F>
where
    F: Fn(&AttemptContext<'_>) -> bool + Send + Sync,
{
    pub fn new(backoffs: Vec<Duration>, predicate: F) -> Self {
        Self { backoffs, predicate }
    }
}

impl<F> fmt::Debug for FnRetryPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRetryPolicy").field("backoffs", &self.backoffs).finish_non_exhaustive()
    }
}

impl<F> RetryPolicy for FnRetryPolicy<F>
where
    F: Fn(&AttemptContext<'_>) -> bool + Send + Sync,
{
    fn backoffs(&self) -> Vec<Duration> {
        self.backoffs.clone()
    }

    fn should_retry(&self, context: &AttemptContext<'_>) -> bool {
        (self.predicate)(context)
    }
}

/// Named preset, as written in client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RetryPreset {
    None,
    #[default]
    Single,
    Exponential,
}

impl RetryPreset {
    /// Build the shared policy value for this preset.
    pub fn policy(self) -> Arc<dyn RetryPolicy> {
        match self {
            Self::None => Arc::new(NoRetry),
            Self::Single => Arc::new(SingleRetry::default()),
            Self::Exponential => Arc::new(ExponentialRetry::default()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Single => "Single",
            Self::Exponential => "Exponential",
        }
    }
}

impl fmt::Display for RetryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown preset name in configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown retry policy '{0}' (expected None, Single or Exponential)")]
pub struct UnknownRetryPreset(pub String);

impl FromStr for RetryPreset {
    type Err = UnknownRetryPreset;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "single" => Ok(Self::Single),
            "exponential" => Ok(Self::Exponential),
            _ => Err(UnknownRetryPreset(value.to_string())),
        }
    }
}

impl TryFrom<String> for RetryPreset {
    type Error = UnknownRetryPreset;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RetryPreset> for String {
    fn from(preset: RetryPreset) -> Self {
        preset.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry presets and eligibility rules

    use super::*;

    fn response(method: &Method, status: u16) -> AttemptContext<'_> {
        AttemptContext::response(method, StatusCode::from_u16(status).unwrap(), 1)
    }

    #[test]
    fn test_preset_backoff_lengths() {
        assert_eq!(NoRetry.backoffs().len(), 0);
        assert_eq!(SingleRetry::default().backoffs().len(), 1);
        assert_eq!(ExponentialRetry::default().backoffs().len(), 5);
    }

    #[test]
    fn test_single_backoff_is_one_second() {
        assert_eq!(SingleRetry::default().backoffs(), vec![Duration::from_millis(1000)]);
    }

    #[test]
    fn test_exponential_nominal_values_double() {
        let nominal = ExponentialRetry::default().nominal_backoffs();
        let millis: Vec<u128> = nominal.iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_exponential_jitter_stays_within_five_percent() {
        let policy = ExponentialRetry::default();
        let nominal = policy.nominal_backoffs();
        for _ in 0..200 {
            for (actual, expected) in policy.backoffs().iter().zip(&nominal) {
                let low = expected.mul_f64(0.95);
                let high = expected.mul_f64(1.05);
                assert!(
                    *actual >= low && *actual <= high,
                    "{actual:?} outside [{low:?}, {high:?}]"
                );
            }
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = ExponentialRetry::new(Duration::from_millis(10), 3, 0.0);
        assert_eq!(policy.backoffs(), policy.nominal_backoffs());
    }

    #[test]
    fn test_jitter_factor_is_clamped() {
        assert_eq!(ExponentialRetry::new(Duration::from_millis(1), 1, 4.0).jitter_factor(), 1.0);
        assert_eq!(ExponentialRetry::new(Duration::from_millis(1), 1, -1.0).jitter_factor(), 0.0);
    }

    #[test]
    fn test_non_finite_jitter_factor_disables_jitter() {
        for factor in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = ExponentialRetry::new(Duration::from_millis(100), 3, factor);
            assert_eq!(policy.jitter_factor(), 0.0);
            assert_eq!(policy.backoffs(), policy.nominal_backoffs());
        }
    }

    #[test]
    fn test_presets_retry_idempotent_server_errors() {
        for policy in [RetryPreset::Single.policy(), RetryPreset::Exponential.policy()] {
            assert!(policy.should_retry(&response(&Method::GET, 500)));
            assert!(policy.should_retry(&response(&Method::PUT, 503)));
            assert!(policy.should_retry(&response(&Method::DELETE, 502)));
            assert!(!policy.should_retry(&response(&Method::GET, 404)));
            assert!(!policy.should_retry(&response(&Method::GET, 200)));
        }
    }

    #[test]
    fn test_presets_never_retry_post_or_patch() {
        for policy in [RetryPreset::Single.policy(), RetryPreset::Exponential.policy()] {
            for status in [500, 502, 503, 504, 599] {
                assert!(!policy.should_retry(&response(&Method::POST, status)));
                assert!(!policy.should_retry(&response(&Method::PATCH, status)));
            }
        }
    }

    #[test]
    fn test_presets_never_retry_transport_errors() {
        let err = TransportError::connect("connection refused");
        let method = Method::GET;
        let context = AttemptContext::transport_failure(&method, &err, 1);
        assert!(!NoRetry.should_retry(&context));
        assert!(!SingleRetry::default().should_retry(&context));
        assert!(!ExponentialRetry::default().should_retry(&context));
    }

    #[test]
    fn test_fn_policy_can_retry_transport_errors() {
        let policy = FnRetryPolicy::new(vec![Duration::from_millis(5); 2], |ctx| {
            ctx.transport_error.is_some()
        });
        let err = TransportError::timeout(Duration::from_secs(1));
        assert!(policy.should_retry(&AttemptContext::transport_failure(&Method::POST, &err, 1)));
        assert_eq!(policy.backoffs().len(), 2);
    }

    #[test]
    fn test_preset_parsing_is_case_insensitive() {
        assert_eq!("Single".parse::<RetryPreset>().unwrap(), RetryPreset::Single);
        assert_eq!("EXPONENTIAL".parse::<RetryPreset>().unwrap(), RetryPreset::Exponential);
        assert_eq!(" none ".parse::<RetryPreset>().unwrap(), RetryPreset::None);
        assert!("linear".parse::<RetryPreset>().is_err());
    }

    #[test]
    fn test_preset_deserializes_from_config_string() {
        let preset: RetryPreset = serde_json::from_str("\"Exponential\"").unwrap();
        assert_eq!(preset, RetryPreset::Exponential);
        assert_eq!(serde_json::to_string(&RetryPreset::Single).unwrap(), "\"Single\"");
        assert!(serde_json::from_str::<RetryPreset>("\"Sometimes\"").is_err());
    }
}

//! Per-service circuit breaker
//!
//! A breaker tracks the recent outcomes of calls to one service and
//! short-circuits new calls while the service looks unhealthy.
//!
//! ```text
//!            volume >= threshold && error% >= threshold
//!   CLOSED ---------------------------------------------> OPEN
//!     ^                                                     |
//!     | trial succeeded                 sleep window elapsed |
//!     |                                                     v
//!     +----------------------- HALF_OPEN <------------------+
//!                                  |        trial failed:
//!                                  +------> OPEN (timestamp refreshed)
//! ```
//!
//! Calls are admitted through [`CircuitBreaker::admit`], which hands out a
//! [`CircuitPermit`]. The permit holds one concurrency slot until it is
//! completed with a [`CallOutcome`] or dropped. Breaker state lives behind a
//! short synchronous mutex; nothing holds it across an await point.
//!
//! With `force_closed` set the breaker never opens and the concurrency cap is
//! lifted, but outcomes are still counted so health logs stay meaningful.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::constants::{
    DEFAULT_ERROR_PERCENT_THRESHOLD, DEFAULT_FORCE_CLOSED, DEFAULT_LOG_INTERVAL,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REQUEST_VOLUME_THRESHOLD, DEFAULT_ROLLING_BUCKETS,
    DEFAULT_ROLLING_WINDOW, DEFAULT_SLEEP_WINDOW,
};
use super::health::{RollingEvent, RollingWindow};
use crate::error::{ErrorClassification, TransportError};
use crate::utils::serde::duration_millis;

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// The service name is already registered with another configuration
    #[error("circuit for service '{service}' is already registered with a different configuration")]
    Conflict { service: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why the breaker refused to admit a call. No network activity happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CircuitRejection {
    /// The breaker is open, or half-open with its trial already in flight
    #[error("circuit for service '{service}' is open")]
    OpenCircuit { service: String },

    /// The concurrency cap was reached while closed
    #[error("circuit for service '{service}' rejected the call: {max_concurrent} requests already in flight")]
    CommandRejected { service: String, max_concurrent: u32 },
}

impl CircuitRejection {
    pub fn service(&self) -> &str {
        match self {
            Self::OpenCircuit { service } | Self::CommandRejected { service, .. } => service,
        }
    }
}

//==============================================================================
// State and Outcomes
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// A single trial is in flight to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Health classification of one completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// A response below 500 arrived
    Success,
    /// Transport error other than a timeout, or a 5xx response
    Failure,
    /// The attempt timed out
    Timeout,
}

impl CallOutcome {
    /// 5xx is a failure; every other status (including 4xx) is healthy.
    pub fn from_status(status: StatusCode) -> Self {
        if status.as_u16() >= 500 {
            Self::Failure
        } else {
            Self::Success
        }
    }

    pub fn from_transport_error(error: &TransportError) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_circuit_failure() {
            Self::Failure
        } else {
            Self::Success
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }

    fn event(self) -> RollingEvent {
        match self {
            Self::Success => RollingEvent::Success,
            Self::Failure => RollingEvent::Failure,
            Self::Timeout => RollingEvent::Timeout,
        }
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker configuration, immutable once a breaker is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Never open and never cap concurrency
    pub force_closed: bool,
    /// Simultaneous admissions allowed while closed
    pub max_concurrent_requests: u32,
    /// Minimum requests in the rolling window before the breaker may open
    pub request_volume_threshold: u32,
    /// Time spent open before one trial is admitted
    #[serde(rename = "sleep_window_ms", with = "duration_millis")]
    pub sleep_window: Duration,
    /// Error percentage at or above which the breaker opens
    pub error_percent_threshold: u32,
    /// Interval between health log records
    #[serde(rename = "log_interval_ms", with = "duration_millis")]
    pub log_interval: Duration,
    /// Length of the rolling statistics window
    #[serde(rename = "rolling_window_ms", with = "duration_millis")]
    pub rolling_window: Duration,
    /// Number of buckets the rolling window is split into
    pub rolling_buckets: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            force_closed: DEFAULT_FORCE_CLOSED,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_volume_threshold: DEFAULT_REQUEST_VOLUME_THRESHOLD,
            sleep_window: DEFAULT_SLEEP_WINDOW,
            error_percent_threshold: DEFAULT_ERROR_PERCENT_THRESHOLD,
            log_interval: DEFAULT_LOG_INTERVAL,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            rolling_buckets: DEFAULT_ROLLING_BUCKETS,
        }
    }
}

impl CircuitConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitConfigBuilder {
        CircuitConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.error_percent_threshold > 100 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "error_percent_threshold must be at most 100, got {}",
                    self.error_percent_threshold
                ),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                message: "max_concurrent_requests must be at least 1".to_string(),
            });
        }
        if self.rolling_buckets == 0 {
            return Err(ConfigError::Invalid {
                message: "rolling_buckets must be at least 1".to_string(),
            });
        }
        if self.rolling_window.as_millis() < u128::from(self.rolling_buckets) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "rolling_window_ms ({}) must be at least rolling_buckets ({})",
                    self.rolling_window.as_millis(),
                    self.rolling_buckets
                ),
            });
        }
        if self.log_interval.is_zero() {
            return Err(ConfigError::Invalid {
                message: "log_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for CircuitConfig
#[derive(Debug, Clone, Default)]
pub struct CircuitConfigBuilder {
    config: CircuitConfig,
}

impl CircuitConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitConfig::default() }
    }

    pub fn force_closed(mut self, force_closed: bool) -> Self {
        self.config.force_closed = force_closed;
        self
    }

    pub fn max_concurrent_requests(mut self, max: u32) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    pub fn request_volume_threshold(mut self, threshold: u32) -> Self {
        self.config.request_volume_threshold = threshold;
        self
    }

    pub fn sleep_window(mut self, window: Duration) -> Self {
        self.config.sleep_window = window;
        self
    }

    pub fn error_percent_threshold(mut self, percent: u32) -> Self {
        self.config.error_percent_threshold = percent;
        self
    }

    pub fn log_interval(mut self, interval: Duration) -> Self {
        self.config.log_interval = interval;
        self
    }

    pub fn rolling_window(mut self, window: Duration, buckets: u32) -> Self {
        self.config.rolling_window = window;
        self.config.rolling_buckets = buckets;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Health Snapshot
//==============================================================================

/// Point-in-time view of a breaker, as written to health logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitHealth {
    pub service: String,
    pub state: CircuitState,
    pub is_open: bool,
    pub force_closed: bool,
    pub request_count: u64,
    pub error_count: u64,
    pub error_percentage: f64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub short_circuited: u64,
    pub rejected: u64,
    pub concurrent_requests: usize,
    pub mean_latency_ms: u64,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug)]
struct Core {
    state: CircuitState,
    opened_at: Option<Instant>,
    window: RollingWindow,
}

/// Hystrix-style circuit breaker for one named service.
///
/// Cloning is cheap and clones share state, so a breaker can be handed to a
/// registry, a health reporter and any number of executors.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitConfig>,
    clock: Arc<dyn Clock>,
    core: Arc<Mutex<Core>>,
    in_flight: Arc<AtomicUsize>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight.load(Ordering::Acquire))
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }

    /// Create a breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitConfig,
        clock: impl Clock,
    ) -> ConfigResult<Self> {
        Self::with_shared_clock(name, config, Arc::new(clock))
    }

    pub(crate) fn with_shared_clock(
        name: impl Into<String>,
        config: CircuitConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(name, config, clock))
    }

    pub(crate) fn from_validated(
        name: impl Into<String>,
        config: CircuitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = RollingWindow::new(config.rolling_window, config.rolling_buckets);
        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            clock,
            core: Arc::new(Mutex::new(Core { state: CircuitState::Closed, opened_at: None, window })),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Current phase. OPEN only turns into HALF_OPEN when a call is admitted.
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() != CircuitState::Closed
    }

    /// Ask for permission to perform one attempt.
    pub fn admit(&self) -> Result<CircuitPermit, CircuitRejection> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        match core.state {
            CircuitState::Closed => {
                let max = self.config.max_concurrent_requests;
                if !self.config.force_closed
                    && self.in_flight.load(Ordering::Acquire) >= max as usize
                {
                    core.window.record(RollingEvent::Rejected, None, now);
                    debug!(service = %self.name, max_concurrent = max, "circuit rejected call");
                    return Err(CircuitRejection::CommandRejected {
                        service: self.name.to_string(),
                        max_concurrent: max,
                    });
                }
                Ok(self.issue_permit(false, now))
            }
            CircuitState::Open => {
                let elapsed = core.opened_at.map(|at| now.saturating_duration_since(at));
                if elapsed.is_some_and(|elapsed| elapsed >= self.config.sleep_window) {
                    core.state = CircuitState::HalfOpen;
                    debug!(service = %self.name, "circuit half-open, admitting trial");
                    Ok(self.issue_permit(true, now))
                } else {
                    core.window.record(RollingEvent::ShortCircuited, None, now);
                    Err(self.open_rejection())
                }
            }
            CircuitState::HalfOpen => {
                core.window.record(RollingEvent::ShortCircuited, None, now);
                Err(self.open_rejection())
            }
        }
    }

    /// Record an outcome that was not obtained through a permit.
    ///
    /// Counted like any other call; it never resolves a half-open trial.
    pub fn record_outcome(&self, outcome: CallOutcome) {
        self.complete(false, outcome, None);
    }

    /// Snapshot of the rolling counters
    pub fn health(&self) -> CircuitHealth {
        let mut core = self.core.lock();
        let counts = core.window.counts(self.clock.now());
        CircuitHealth {
            service: self.name.to_string(),
            state: core.state,
            is_open: core.state != CircuitState::Closed,
            force_closed: self.config.force_closed,
            request_count: counts.request_count(),
            error_count: counts.error_count(),
            error_percentage: counts.error_percentage(),
            successes: counts.successes,
            failures: counts.failures,
            timeouts: counts.timeouts,
            short_circuited: counts.short_circuited,
            rejected: counts.rejected,
            concurrent_requests: self.in_flight.load(Ordering::Acquire),
            mean_latency_ms: u64::try_from(counts.mean_latency().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Close the breaker and forget all counted outcomes.
    ///
    /// Permits already handed out stay valid.
    pub fn reset(&self) {
        let mut core = self.core.lock();
        core.state = CircuitState::Closed;
        core.opened_at = None;
        core.window.reset();
        info!(service = %self.name, "circuit reset");
    }

    fn issue_permit(&self, trial: bool, now: Instant) -> CircuitPermit {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        CircuitPermit { breaker: self.clone(), trial, started_at: now, completed: false }
    }

    fn open_rejection(&self) -> CircuitRejection {
        CircuitRejection::OpenCircuit { service: self.name.to_string() }
    }

    fn complete(&self, trial: bool, outcome: CallOutcome, latency: Option<Duration>) {
        let mut core = self.core.lock();
        let now = self.clock.now();
        core.window.record(outcome.event(), latency, now);

        match core.state {
            CircuitState::HalfOpen if trial => {
                if outcome.is_failure() {
                    core.state = CircuitState::Open;
                    core.opened_at = Some(now);
                    warn!(service = %self.name, ?outcome, "circuit trial failed, reopening");
                } else {
                    core.state = CircuitState::Closed;
                    core.opened_at = None;
                    core.window.reset();
                    info!(service = %self.name, "circuit trial succeeded, closing");
                }
            }
            CircuitState::Closed if !self.config.force_closed => {
                let counts = core.window.counts(now);
                let volume_reached =
                    counts.request_count() >= u64::from(self.config.request_volume_threshold);
                let unhealthy =
                    counts.error_percentage() >= f64::from(self.config.error_percent_threshold);
                if volume_reached && unhealthy {
                    core.state = CircuitState::Open;
                    core.opened_at = Some(now);
                    warn!(
                        service = %self.name,
                        request_count = counts.request_count(),
                        error_percentage = counts.error_percentage(),
                        "circuit opened"
                    );
                }
            }
            // Late completions of calls admitted before a transition are only counted
            _ => {}
        }
    }

    fn abandon_trial(&self) {
        let mut core = self.core.lock();
        if core.state == CircuitState::HalfOpen {
            core.state = CircuitState::Open;
            debug!(service = %self.name, "circuit trial abandoned, back to open");
        }
    }
}

//==============================================================================
// Permit
//==============================================================================

/// Admission to perform one attempt.
///
/// Complete it with the attempt's outcome. Dropping it without completing
/// frees the concurrency slot; an abandoned trial puts the breaker back to
/// OPEN so a later call can take the trial.
#[must_use = "a permit must be completed with the attempt outcome"]
#[derive(Debug)]
pub struct CircuitPermit {
    breaker: CircuitBreaker,
    trial: bool,
    started_at: Instant,
    completed: bool,
}

impl CircuitPermit {
    /// Whether this permit is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Record the attempt outcome and release the slot.
    pub fn complete(mut self, outcome: CallOutcome) {
        let latency = self.breaker.clock.now().saturating_duration_since(self.started_at);
        self.breaker.complete(self.trial, outcome, Some(latency));
        self.completed = true;
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        self.breaker.in_flight.fetch_sub(1, Ordering::AcqRel);
        if !self.completed && self.trial {
            self.breaker.abandon_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the circuit breaker state machine
    //!
    //! Time is driven through `MockClock`, so sleep-window and rolling-window
    //! behavior is tested without real delays.

    use super::*;
    use crate::resilience::clock::MockClock;

    fn breaker_with(config: CircuitConfig) -> (CircuitBreaker, MockClock) {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::with_clock("petstore", config, clock.clone())
            .expect("valid config");
        (breaker, clock)
    }

    fn strict_config() -> CircuitConfig {
        CircuitConfig::builder().force_closed(false).build().expect("valid config")
    }

    fn run(breaker: &CircuitBreaker, outcome: CallOutcome) {
        breaker.admit().expect("call should be admitted").complete(outcome);
    }

    fn open(breaker: &CircuitBreaker) {
        for _ in 0..20 {
            run(breaker, CallOutcome::Failure);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = CircuitConfig::default();
        assert!(config.force_closed);
        assert_eq!(config.max_concurrent_requests, 100);
        assert_eq!(config.request_volume_threshold, 20);
        assert_eq!(config.sleep_window, Duration::from_millis(5000));
        assert_eq!(config.error_percent_threshold, 90);
        assert_eq!(config.log_interval, Duration::from_millis(30_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        assert!(CircuitConfig::builder().error_percent_threshold(101).build().is_err());
        assert!(CircuitConfig::builder().max_concurrent_requests(0).build().is_err());
        assert!(CircuitConfig::builder()
            .rolling_window(Duration::from_millis(10_000), 0)
            .build()
            .is_err());
        assert!(CircuitConfig::builder().rolling_window(Duration::from_millis(5), 10).build().is_err());
        assert!(CircuitConfig::builder().log_interval(Duration::ZERO).build().is_err());
        assert!(CircuitConfig::builder().error_percent_threshold(100).build().is_ok());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: CircuitConfig =
            serde_json::from_str(r#"{"force_closed": false, "sleep_window_ms": 250}"#).unwrap();
        assert!(!config.force_closed);
        assert_eq!(config.sleep_window, Duration::from_millis(250));
        assert_eq!(config.request_volume_threshold, 20);
    }

    #[test]
    fn test_opens_exactly_at_volume_threshold() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..19 {
            run(&breaker, CallOutcome::Failure);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        run(&breaker, CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_opens_at_error_percentage_boundary() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..2 {
            run(&breaker, CallOutcome::Success);
        }
        for _ in 0..18 {
            run(&breaker, CallOutcome::Failure);
        }
        // 18 / 20 = 90%
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_stays_closed_below_error_percentage() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..3 {
            run(&breaker, CallOutcome::Success);
        }
        for _ in 0..17 {
            run(&breaker, CallOutcome::Failure);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().error_percentage, 85.0);
    }

    #[test]
    fn test_timeouts_count_towards_opening() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..10 {
            run(&breaker, CallOutcome::Timeout);
            run(&breaker, CallOutcome::Failure);
        }
        let health = breaker.health();
        assert_eq!(health.timeouts, 10);
        assert_eq!(health.failures, 10);
        assert!(health.is_open);
    }

    #[test]
    fn test_force_closed_never_opens() {
        let (breaker, _clock) = breaker_with(CircuitConfig::default());
        for _ in 0..100 {
            run(&breaker, CallOutcome::Failure);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().error_count, 100);
    }

    #[test]
    fn test_client_errors_are_not_failures() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..20 {
            run(&breaker, CallOutcome::from_status(StatusCode::NOT_FOUND));
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().error_count, 0);
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(CallOutcome::from_status(StatusCode::OK), CallOutcome::Success);
        assert_eq!(CallOutcome::from_status(StatusCode::MOVED_PERMANENTLY), CallOutcome::Success);
        assert_eq!(CallOutcome::from_status(StatusCode::BAD_REQUEST), CallOutcome::Success);
        assert_eq!(CallOutcome::from_status(StatusCode::BAD_GATEWAY), CallOutcome::Failure);
        assert_eq!(
            CallOutcome::from_transport_error(&TransportError::timeout(Duration::from_secs(5))),
            CallOutcome::Timeout
        );
        assert_eq!(
            CallOutcome::from_transport_error(&TransportError::connect("refused")),
            CallOutcome::Failure
        );
    }

    #[test]
    fn test_open_rejects_until_sleep_window() {
        let (breaker, clock) = breaker_with(strict_config());
        open(&breaker);

        clock.advance_millis(4_999);
        let err = breaker.admit().unwrap_err();
        assert_eq!(err, CircuitRejection::OpenCircuit { service: "petstore".to_string() });
        assert_eq!(breaker.health().short_circuited, 1);

        clock.advance_millis(1);
        let trial = breaker.admit().expect("trial admitted after sleep window");
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        drop(trial);
    }

    #[test]
    fn test_only_one_trial_in_flight() {
        let (breaker, clock) = breaker_with(strict_config());
        open(&breaker);
        clock.advance_millis(5_000);

        let trial = breaker.admit().expect("trial admitted");
        assert!(matches!(breaker.admit(), Err(CircuitRejection::OpenCircuit { .. })));
        assert!(matches!(breaker.admit(), Err(CircuitRejection::OpenCircuit { .. })));
        trial.complete(CallOutcome::Success);
    }

    #[test]
    fn test_trial_success_closes_and_resets_window() {
        let (breaker, clock) = breaker_with(strict_config());
        open(&breaker);
        clock.advance_millis(5_000);

        breaker.admit().expect("trial admitted").complete(CallOutcome::Success);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().request_count, 0);
        assert!(breaker.admit().is_ok());
    }

    #[test]
    fn test_trial_failure_reopens_with_fresh_timestamp() {
        let (breaker, clock) = breaker_with(strict_config());
        open(&breaker);
        clock.advance_millis(5_000);

        breaker.admit().expect("trial admitted").complete(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance_millis(4_000);
        assert!(breaker.admit().is_err(), "sleep window restarts after a failed trial");

        clock.advance_millis(1_000);
        assert!(breaker.admit().is_ok());
    }

    #[test]
    fn test_dropped_trial_returns_to_open() {
        let (breaker, clock) = breaker_with(strict_config());
        open(&breaker);
        clock.advance_millis(5_000);

        drop(breaker.admit().expect("trial admitted"));
        assert_eq!(breaker.state(), CircuitState::Open);

        let retry_trial = breaker.admit().expect("a later call may take the trial");
        assert!(retry_trial.is_trial());
        retry_trial.complete(CallOutcome::Success);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_concurrency_cap_rejects_excess_calls() {
        let config = CircuitConfig::builder()
            .force_closed(false)
            .max_concurrent_requests(2)
            .build()
            .unwrap();
        let (breaker, _clock) = breaker_with(config);

        let first = breaker.admit().unwrap();
        let second = breaker.admit().unwrap();
        let err = breaker.admit().unwrap_err();
        assert_eq!(
            err,
            CircuitRejection::CommandRejected { service: "petstore".to_string(), max_concurrent: 2 }
        );
        assert_eq!(breaker.health().concurrent_requests, 2);

        first.complete(CallOutcome::Success);
        let third = breaker.admit().expect("slot freed by completion");
        drop(second);
        drop(third);

        let health = breaker.health();
        assert_eq!(health.concurrent_requests, 0);
        assert_eq!(health.rejected, 1);
        assert_eq!(health.error_count, 0, "rejections are never failures");
    }

    #[test]
    fn test_force_closed_lifts_concurrency_cap() {
        let config = CircuitConfig::builder().max_concurrent_requests(1).build().unwrap();
        let (breaker, _clock) = breaker_with(config);

        let permits: Vec<_> = (0..5).map(|_| breaker.admit().unwrap()).collect();
        assert_eq!(breaker.health().concurrent_requests, 5);
        drop(permits);
        assert_eq!(breaker.health().concurrent_requests, 0);
    }

    #[test]
    fn test_rolling_window_forgets_old_failures() {
        let config = CircuitConfig::builder()
            .force_closed(false)
            .request_volume_threshold(4)
            .build()
            .unwrap();
        let (breaker, clock) = breaker_with(config);

        for _ in 0..3 {
            run(&breaker, CallOutcome::Failure);
        }
        clock.advance_millis(10_000);
        run(&breaker, CallOutcome::Failure);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().request_count, 1);
    }

    #[test]
    fn test_record_outcome_without_permit_counts() {
        let (breaker, _clock) = breaker_with(strict_config());
        for _ in 0..20 {
            breaker.record_outcome(CallOutcome::Failure);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_reset_closes_breaker() {
        let (breaker, _clock) = breaker_with(strict_config());
        open(&breaker);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().request_count, 0);
    }

    #[test]
    fn test_clones_share_state() {
        let (breaker, _clock) = breaker_with(strict_config());
        let other = breaker.clone();
        open(&breaker);
        assert!(other.is_open());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }
}

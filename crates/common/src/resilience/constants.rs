// Defaults for the resilient request executor
use std::time::Duration;

/// Single preset: the one backoff before the only retry
pub const SINGLE_BACKOFF: Duration = Duration::from_millis(1000);

/// Exponential preset: first backoff
pub const EXPONENTIAL_BASE_DELAY: Duration = Duration::from_millis(100);

/// Exponential preset: number of retries
pub const EXPONENTIAL_RETRIES: u32 = 5;

/// Exponential preset: jitter as a fraction of the nominal delay (±5%)
pub const EXPONENTIAL_JITTER_FACTOR: f64 = 0.05;

/// Circuit breaker: `forceClosed` default
pub const DEFAULT_FORCE_CLOSED: bool = true;

/// Circuit breaker: concurrent admissions allowed while closed
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: u32 = 100;

/// Circuit breaker: minimum rolling requests before the breaker may open
pub const DEFAULT_REQUEST_VOLUME_THRESHOLD: u32 = 20;

/// Circuit breaker: time spent open before a trial is admitted
pub const DEFAULT_SLEEP_WINDOW: Duration = Duration::from_millis(5000);

/// Circuit breaker: error percentage at or above which the breaker opens
pub const DEFAULT_ERROR_PERCENT_THRESHOLD: u32 = 90;

/// Circuit breaker: interval between health log records
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_millis(30_000);

/// Rolling statistics window length
pub const DEFAULT_ROLLING_WINDOW: Duration = Duration::from_millis(10_000);

/// Number of buckets the rolling window is split into
pub const DEFAULT_ROLLING_BUCKETS: u32 = 10;

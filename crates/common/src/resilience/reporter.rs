//! Periodic health logging for a circuit breaker

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::circuit_breaker::CircuitBreaker;
use crate::observability::CallLogger;

/// Background task writing one health record per log interval.
///
/// The task is aborted when the reporter is dropped, so its lifetime follows
/// the client that owns it.
#[derive(Debug)]
pub struct HealthReporter {
    service: String,
    handle: JoinHandle<()>,
}

impl HealthReporter {
    /// Spawn on the current tokio runtime, ticking every
    /// `breaker.config().log_interval`.
    ///
    /// Returns `None` outside a runtime; the breaker keeps working, only the
    /// periodic log is skipped.
    pub fn spawn(breaker: CircuitBreaker, logger: Arc<dyn CallLogger>) -> Option<Self> {
        let interval = breaker.config().log_interval;
        Self::spawn_with_interval(breaker, logger, interval)
    }

    pub fn spawn_with_interval(
        breaker: CircuitBreaker,
        logger: Arc<dyn CallLogger>,
        period: Duration,
    ) -> Option<Self> {
        if period.is_zero() {
            return None;
        }
        let runtime = Handle::try_current().ok()?;
        let service = breaker.name().to_string();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                logger.log_health(&breaker.health());
            }
        });

        debug!(service = %service, period_ms = period.as_millis(), "health reporter started");
        Some(Self { service, handle })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for HealthReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

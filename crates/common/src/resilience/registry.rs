//! Registry of circuit breakers keyed by service name.
//!
//! Every client that talks to the same service through the same registry
//! shares one breaker and one health reporter. The first registration of a
//! name fixes its configuration; a later registration asking for a different
//! one is refused.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::circuit_breaker::{
    CallOutcome, CircuitBreaker, CircuitConfig, CircuitHealth, CircuitPermit, CircuitRejection,
    ConfigError, ConfigResult,
};
use super::clock::{Clock, SystemClock};
use super::reporter::HealthReporter;
use crate::observability::CallLogger;

/// Thread-safe map from service name to its circuit breaker.
///
/// Pass one `Arc<CircuitRegistry>` to several clients to make them share
/// breakers; tests call [`CircuitRegistry::clear`] between cases.
pub struct CircuitRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    reporters: DashMap<String, Weak<HealthReporter>>,
    default_config: CircuitConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitRegistry")
            .field("services", &self.names())
            .field("default_config", &self.default_config)
            .finish()
    }
}

impl CircuitRegistry {
    /// Create an empty registry using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            reporters: DashMap::new(),
            default_config: CircuitConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an empty registry whose breakers read time from `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock) -> Self {
        Self { clock: Arc::new(clock), ..Self::new() }
    }

    /// Configuration used by [`CircuitRegistry::admit`] and
    /// [`CircuitRegistry::record_outcome`] for services not registered yet.
    pub fn with_default_config(mut self, config: CircuitConfig) -> ConfigResult<Self> {
        config.validate()?;
        self.default_config = config;
        Ok(self)
    }

    /// Get the breaker for `service`, creating it with `config` if absent.
    ///
    /// # Errors
    /// [`ConfigError::Conflict`] if `service` is registered with a config
    /// other than `config`; [`ConfigError::Invalid`] if `config` fails
    /// validation.
    pub fn breaker(&self, service: &str, config: &CircuitConfig) -> ConfigResult<CircuitBreaker> {
        match self.breakers.entry(service.to_owned()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if existing.config() != config {
                    warn!(service, "circuit already registered with a different configuration");
                    return Err(ConfigError::Conflict { service: service.to_owned() });
                }
                Ok(existing.clone())
            }
            Entry::Vacant(entry) => {
                let breaker = CircuitBreaker::with_shared_clock(
                    service,
                    config.clone(),
                    Arc::clone(&self.clock),
                )?;
                debug!(service, "registered circuit breaker");
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// The health reporter of `breaker`, spawning it on first use.
    ///
    /// Every caller gets the same reporter while any handle to it is alive,
    /// so clients sharing a breaker log one health record per interval. The
    /// logger of the caller that spawned it is the one used. `None` outside
    /// a tokio runtime.
    pub fn health_reporter(
        &self,
        breaker: &CircuitBreaker,
        logger: Arc<dyn CallLogger>,
    ) -> Option<Arc<HealthReporter>> {
        let mut slot = self.reporters.entry(breaker.name().to_owned()).or_default();
        if let Some(reporter) = slot.upgrade() {
            return Some(reporter);
        }
        let reporter = Arc::new(HealthReporter::spawn(breaker.clone(), logger)?);
        *slot = Arc::downgrade(&reporter);
        Some(reporter)
    }

    /// Look up an existing breaker.
    pub fn get(&self, service: &str) -> Option<CircuitBreaker> {
        self.breakers.get(service).map(|entry| entry.value().clone())
    }

    /// Admit one attempt against `service`.
    pub fn admit(&self, service: &str) -> Result<CircuitPermit, CircuitRejection> {
        self.default_breaker(service).admit()
    }

    /// Record an outcome for `service` without a permit.
    pub fn record_outcome(&self, service: &str, outcome: CallOutcome) {
        self.default_breaker(service).record_outcome(outcome);
    }

    /// Forget one service. Clients still holding its breaker keep using it.
    pub fn remove(&self, service: &str) -> Option<CircuitBreaker> {
        self.reporters.remove(service);
        self.breakers.remove(service).map(|(_, breaker)| breaker)
    }

    /// Forget every service.
    pub fn clear(&self) {
        self.reporters.clear();
        self.breakers.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Health of every registered breaker, sorted by service name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<CircuitHealth> {
        let breakers: Vec<CircuitBreaker> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        let mut health: Vec<CircuitHealth> = breakers.iter().map(CircuitBreaker::health).collect();
        health.sort_by(|a, b| a.service.cmp(&b.service));
        health
    }

    fn default_breaker(&self, service: &str) -> CircuitBreaker {
        if let Some(existing) = self.get(service) {
            return existing;
        }
        self.breakers
            .entry(service.to_owned())
            .or_insert_with(|| {
                CircuitBreaker::from_validated(
                    service,
                    self.default_config.clone(),
                    Arc::clone(&self.clock),
                )
            })
            .value()
            .clone()
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

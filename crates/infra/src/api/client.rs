//! API client construction
//!
//! [`ClientBuilder`] collects the constructor options every generated client
//! shares and turns them into a [`Client`]: a resolved base URL, a transport,
//! the service's circuit breaker (from an injectable registry) and the
//! [`RequestExecutor`] that ties them together.

use std::sync::Arc;
use std::time::Duration;

use tollgate_common::observability::{CallLogger, Tracer, TracingCallLogger};
use tollgate_common::resilience::{
    CircuitBreaker, CircuitConfig, CircuitRegistry, ConfigError, HealthReporter, RetryPolicy,
    RetryPreset,
};
use tracing::{debug, info};
use url::Url;

use super::discovery::{EndpointVariant, ServiceDiscovery};
use super::errors::{ClientBuildError, ExecuteError};
use super::executor::RequestExecutor;
use super::request::OperationRequest;
use super::response::RawResponse;
use crate::config::ClientConfig;
use crate::http::{HttpTransport, Transport};

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Builder for [`Client`]
#[derive(Debug)]
pub struct ClientBuilder {
    api_name: String,
    service_name: Option<String>,
    address: Option<String>,
    discovery: Option<(Arc<dyn ServiceDiscovery>, EndpointVariant)>,
    timeout: Duration,
    keepalive: bool,
    gzip: bool,
    retry_policy: Arc<dyn RetryPolicy>,
    logger: Arc<dyn CallLogger>,
    tracer: Option<Arc<dyn Tracer>>,
    circuit: CircuitConfig,
    registry: Option<Arc<CircuitRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    health_reporting: bool,
}

impl ClientBuilder {
    /// Builder for a client of the API called `api_name`; the name is also
    /// the default circuit service name.
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            service_name: None,
            address: None,
            discovery: None,
            timeout: DEFAULT_TIMEOUT,
            keepalive: true,
            gzip: true,
            retry_policy: RetryPreset::default().policy(),
            logger: Arc::new(TracingCallLogger),
            tracer: None,
            circuit: CircuitConfig::default(),
            registry: None,
            transport: None,
            health_reporting: true,
        }
    }

    /// Apply a loaded configuration on top of the current options.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        if let Some(address) = &config.address {
            self.address = Some(address.clone());
        }
        if let Some(service) = &config.service_name {
            self.service_name = Some(service.clone());
        }
        self.timeout = config.timeout;
        self.keepalive = config.keepalive;
        self.gzip = config.gzip;
        self.retry_policy = config.retry.policy();
        self.circuit = config.circuit.clone();
        self
    }

    /// Fixed base URL, e.g. `http://pets.internal:8080/v1`
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Resolve the base URL through `discovery` at build time.
    pub fn discovery(
        mut self,
        discovery: Arc<dyn ServiceDiscovery>,
        variant: EndpointVariant,
    ) -> Self {
        self.discovery = Some((discovery, variant));
        self
    }

    /// Circuit breaker name; distinct per breaker sharing a registry.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn retry_preset(self, preset: RetryPreset) -> Self {
        self.retry_policy(preset.policy())
    }

    pub fn logger(mut self, logger: Arc<dyn CallLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn circuit(mut self, config: CircuitConfig) -> Self {
        self.circuit = config;
        self
    }

    /// Share circuit breakers with other clients through `registry`.
    pub fn registry(mut self, registry: Arc<CircuitRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the reqwest transport (the HTTP options are then ignored).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Periodic circuit health records every `log_interval` (default on)
    pub fn health_reporting(mut self, enabled: bool) -> Self {
        self.health_reporting = enabled;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// - [`ClientBuildError::MissingEndpoint`] / [`ClientBuildError::ConflictingEndpoint`]
    ///   unless exactly one of address and discovery is set
    /// - [`ClientBuildError::InvalidAddress`], [`ClientBuildError::Discovery`]
    ///   when no base URL can be obtained
    /// - [`ClientBuildError::Circuit`] for an invalid circuit configuration
    /// - [`ClientBuildError::Transport`] if the HTTP client cannot be built
    pub fn build(self) -> Result<Client, ClientBuildError> {
        let service = self.service_name.clone().unwrap_or_else(|| self.api_name.clone());
        let base_url = self.base_url(&service)?;

        self.circuit.validate()?;
        let registry = self.registry.unwrap_or_else(|| Arc::new(CircuitRegistry::new()));
        let breaker = registry.breaker(&service, &self.circuit).map_err(|err| match err {
            ConfigError::Conflict { service } => {
                ClientBuildError::ConflictingCircuitConfig { service }
            }
            other => ClientBuildError::Circuit(other),
        })?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::builder()
                    .timeout(self.timeout)
                    .keepalive(self.keepalive)
                    .gzip(self.gzip)
                    .build()?,
            ),
        };

        let mut executor = RequestExecutor::new(
            base_url,
            transport,
            breaker.clone(),
            self.retry_policy,
            Arc::clone(&self.logger),
        )
        .with_timeout(self.timeout);
        if let Some(tracer) = self.tracer {
            executor = executor.with_tracer(tracer);
        }

        let reporter = if self.health_reporting {
            registry.health_reporter(&breaker, self.logger)
        } else {
            None
        };

        info!(
            service = %service,
            base_url = %executor.base_url(),
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            "API client ready"
        );

        Ok(Client { executor, registry, reporter })
    }

    fn base_url(&self, service: &str) -> Result<Url, ClientBuildError> {
        match (&self.address, &self.discovery) {
            (Some(_), Some(_)) => Err(ClientBuildError::ConflictingEndpoint),
            (None, None) => Err(ClientBuildError::MissingEndpoint),
            (Some(address), None) => Url::parse(address).map_err(|source| {
                ClientBuildError::InvalidAddress { address: address.clone(), source }
            }),
            (None, Some((discovery, variant))) => {
                let url = discovery.resolve(service, *variant)?;
                debug!(service, %variant, %url, "resolved base URL through discovery");
                Ok(url)
            }
        }
    }
}

/// Client shared by all generated operations of one API.
///
/// Cheap to clone; clones share the executor, the breaker and the health
/// reporter, which stops once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Client {
    executor: RequestExecutor,
    registry: Arc<CircuitRegistry>,
    reporter: Option<Arc<HealthReporter>>,
}

impl Client {
    pub fn builder(api_name: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_name)
    }

    pub async fn execute(&self, request: &OperationRequest) -> Result<RawResponse, ExecuteError> {
        self.executor.execute(request).await
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn service(&self) -> &str {
        self.executor.service()
    }

    pub fn base_url(&self) -> &Url {
        self.executor.base_url()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        self.executor.breaker()
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// Background health logger, if one is running
    pub fn health_reporter(&self) -> Option<&HealthReporter> {
        self.reporter.as_deref()
    }
}

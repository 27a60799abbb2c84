//! Service discovery collaborator
//!
//! A client built with discovery instead of a fixed address asks its
//! [`ServiceDiscovery`] for the base URL once, at construction time. How a
//! real discovery backend finds the service is outside this crate;
//! [`StaticDiscovery`] serves fixed entries for tests and local setups.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use url::Url;

/// Which of a service's published endpoints to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointVariant {
    #[default]
    Http,
    Https,
}

impl fmt::Display for EndpointVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no {variant} endpoint registered for service '{service}'")]
    UnknownService { service: String, variant: EndpointVariant },

    #[error("discovery unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a service name to its base URL.
pub trait ServiceDiscovery: Send + Sync + fmt::Debug {
    fn resolve(&self, service: &str, variant: EndpointVariant) -> Result<Url, DiscoveryError>;
}

/// Discovery backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    endpoints: HashMap<(String, EndpointVariant), Url>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(
        mut self,
        service: impl Into<String>,
        variant: EndpointVariant,
        base_url: Url,
    ) -> Self {
        self.endpoints.insert((service.into(), variant), base_url);
        self
    }
}

impl ServiceDiscovery for StaticDiscovery {
    fn resolve(&self, service: &str, variant: EndpointVariant) -> Result<Url, DiscoveryError> {
        self.endpoints.get(&(service.to_string(), variant)).cloned().ok_or_else(|| {
            DiscoveryError::UnknownService { service: service.to_string(), variant }
        })
    }
}

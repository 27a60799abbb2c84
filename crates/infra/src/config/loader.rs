//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TOLLGATE_ADDRESS` is missing, falls back to loading from file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TOLLGATE_ADDRESS`: Base URL of the service (required)
//! - `TOLLGATE_SERVICE_NAME`: Circuit breaker service name
//! - `TOLLGATE_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `TOLLGATE_KEEPALIVE`: Reuse connections (true/false)
//! - `TOLLGATE_GZIP`: Accept gzip responses (true/false)
//! - `TOLLGATE_RETRY`: Retry preset (`none`, `single`, `exponential`)
//! - `TOLLGATE_CIRCUIT_FORCE_CLOSED`: Never open the circuit (true/false)
//! - `TOLLGATE_CIRCUIT_MAX_CONCURRENT`: Concurrency cap
//! - `TOLLGATE_CIRCUIT_VOLUME_THRESHOLD`: Minimum rolling request count
//! - `TOLLGATE_CIRCUIT_SLEEP_WINDOW_MS`: Open duration before a trial
//! - `TOLLGATE_CIRCUIT_ERROR_PERCENT`: Error percentage that opens
//! - `TOLLGATE_CIRCUIT_LOG_INTERVAL_MS`: Health log interval
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./tollgate.toml` or `./tollgate.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_common::resilience::{CircuitConfig, ConfigError, RetryPreset};
use tollgate_common::utils::duration_millis;

use crate::api::client::DEFAULT_TIMEOUT;

/// Client options as read from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub address: Option<String>,

    pub service_name: Option<String>,

    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,

    pub keepalive: bool,

    pub gzip: bool,

    pub retry: RetryPreset,

    pub circuit: CircuitConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: None,
            service_name: None,
            timeout: DEFAULT_TIMEOUT,
            keepalive: true,
            gzip: true,
            retry: RetryPreset::default(),
            circuit: CircuitConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidVar { key: String, value: String, reason: String },

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no config file found in any of the standard locations")]
    NoConfigFile,

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML format: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Circuit(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ConfigLoadError>;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails, falls
/// back to loading from a config file.
///
/// # Errors
/// Returns the file loader's error when neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `TOLLGATE_ADDRESS` is required; every other variable falls back to its
/// default.
///
/// # Errors
/// Returns [`ConfigLoadError::MissingVar`] without an address and
/// [`ConfigLoadError::InvalidVar`] for unparsable values.
pub fn load_from_env() -> Result<ClientConfig> {
    let defaults = ClientConfig::default();
    let circuit_defaults = defaults.circuit.clone();

    let address = env_var("TOLLGATE_ADDRESS")?;
    let service_name = std::env::var("TOLLGATE_SERVICE_NAME").ok();
    let timeout =
        env_parse("TOLLGATE_TIMEOUT_MS")?.map_or(defaults.timeout, Duration::from_millis);
    let keepalive = env_bool("TOLLGATE_KEEPALIVE", defaults.keepalive);
    let gzip = env_bool("TOLLGATE_GZIP", defaults.gzip);
    let retry = env_parse::<RetryPreset>("TOLLGATE_RETRY")?.unwrap_or(defaults.retry);

    let circuit = CircuitConfig {
        force_closed: env_bool("TOLLGATE_CIRCUIT_FORCE_CLOSED", circuit_defaults.force_closed),
        max_concurrent_requests: env_parse("TOLLGATE_CIRCUIT_MAX_CONCURRENT")?
            .unwrap_or(circuit_defaults.max_concurrent_requests),
        request_volume_threshold: env_parse("TOLLGATE_CIRCUIT_VOLUME_THRESHOLD")?
            .unwrap_or(circuit_defaults.request_volume_threshold),
        sleep_window: env_parse("TOLLGATE_CIRCUIT_SLEEP_WINDOW_MS")?
            .map_or(circuit_defaults.sleep_window, Duration::from_millis),
        error_percent_threshold: env_parse("TOLLGATE_CIRCUIT_ERROR_PERCENT")?
            .unwrap_or(circuit_defaults.error_percent_threshold),
        log_interval: env_parse("TOLLGATE_CIRCUIT_LOG_INTERVAL_MS")?
            .map_or(circuit_defaults.log_interval, Duration::from_millis),
        ..circuit_defaults
    };
    circuit.validate()?;

    Ok(ClientConfig {
        address: Some(address),
        service_name,
        timeout,
        keepalive,
        gzip,
        retry,
        circuit,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns an error if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The circuit section fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigLoadError::NotFound(p));
            }
            p
        }
        None => search_config_paths().ok_or(ConfigLoadError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigLoadError::Io { path: config_path.clone(), source })?;

    let config = parse_config(&contents, &config_path)?;
    config.circuit.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); a file without
/// an extension is read as JSON.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => Ok(serde_json::from_str(contents)?),
        _ => Err(ConfigLoadError::UnsupportedFormat(extension.to_string())),
    }
}

/// Trial multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn search_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["tollgate.toml", "tollgate.json", "config.toml", "config.json"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ConfigLoadError::MissingVar(key.to_string()))
}

/// Parse an optional environment variable; unset yields `None`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|e| ConfigLoadError::InvalidVar {
            key: key.to_string(),
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

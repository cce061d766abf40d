//! Gateway configuration
//!
//! Defaults come from `Default`. `Config::load()` reads the TOML file named
//! by `GATEWAY_CONFIG` when set, otherwise environment variables.

use adapters::mobile_money::MOBILE_MONEY_PROVIDER;
use adapters::sepa::SEPA_PROVIDER;
use ledger_core::AnchorConfig;
use message_bus::{PublisherConfig, DEFAULT_NOTIFY_QUEUE_CAPACITY};
use resilience::{CircuitBreakerConfig, RetryConfig, ServiceClientConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Name of the EVM node dependency in the service registry
pub const ANCHOR_NODE_SERVICE: &str = "evm-node";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Variable or field holds an unusable value
    #[error("Invalid value for {key}: {value}")]
    Invalid {
        /// Variable or field
        key: String,
        /// Offending value
        value: String,
    },

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Anchoring section rejected
    #[error(transparent)]
    Anchor(#[from] ledger_core::Error),
}

/// Gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// Breaker settings for every downstream dependency
    pub breaker: CircuitBreakerConfig,
    /// Retry settings for every rail dependency
    pub retry: RetryConfig,
    /// Rail connectors
    pub rails: RailsConfig,
    /// Merkle root anchoring
    pub anchor: AnchorConfig,
    /// Event bus
    pub bus: BusConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rail connectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RailsConfig {
    /// SEPA Instant
    pub sepa: RailConfig,
    /// Mobile money
    pub mobile_money: RailConfig,
}

/// One rail connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RailConfig {
    /// Register the connector
    pub enabled: bool,
    /// Remote rail gateway; the connector runs in sandbox mode when unset
    pub base_url: Option<String>,
    /// Per-attempt HTTP timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Publisher; events are only logged when no URL is set
    pub publisher: PublisherConfig,
    /// Notification queue capacity
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            publisher: PublisherConfig::default(),
            queue_capacity: DEFAULT_NOTIFY_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load from `GATEWAY_CONFIG` when set, otherwise from the environment
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("GATEWAY_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config {
            anchor: AnchorConfig::from_env()?,
            ..Config::default()
        };

        if let Ok(host) = env::var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_env("SERVER_PORT")? {
            config.server.port = port;
        }

        if let Some(v) = parse_env("CB_FAILURE_THRESHOLD")? {
            config.breaker.failure_threshold = v;
        }
        if let Some(v) = parse_env("CB_SUCCESS_THRESHOLD")? {
            config.breaker.success_threshold = v;
        }
        if let Some(v) = parse_env("CB_RESET_TIMEOUT_MS")? {
            config.breaker.reset_timeout_ms = v;
        }
        if let Some(v) = parse_env("CB_CALL_TIMEOUT_MS")? {
            config.breaker.call_timeout_ms = v;
        }
        if let Some(v) = parse_env("RETRY_MAX_RETRIES")? {
            config.retry.max_retries = v;
        }

        if let Ok(url) = env::var("SEPA_BASE_URL") {
            config.rails.sepa.base_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(enabled) = parse_env("SEPA_ENABLED")? {
            config.rails.sepa.enabled = enabled;
        }
        if let Ok(url) = env::var("MOBILE_MONEY_BASE_URL") {
            config.rails.mobile_money.base_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(enabled) = parse_env("MOBILE_MONEY_ENABLED")? {
            config.rails.mobile_money.enabled = enabled;
        }

        if let Ok(url) = env::var("NATS_URL") {
            config.bus.publisher.url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(v) = parse_env("NATS_USE_JETSTREAM")? {
            config.bus.publisher.use_jetstream = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.breaker.failure_threshold == 0 {
            return Err(invalid("breaker.failure_threshold", 0));
        }
        if self.breaker.success_threshold == 0 {
            return Err(invalid("breaker.success_threshold", 0));
        }
        if self.bus.queue_capacity == 0 {
            return Err(invalid("bus.queue_capacity", 0));
        }
        self.anchor.validate()?;
        Ok(())
    }

    /// One service client per remote dependency
    pub fn service_configs(&self) -> Vec<ServiceClientConfig> {
        let rails = [
            (SEPA_PROVIDER, &self.rails.sepa),
            (MOBILE_MONEY_PROVIDER, &self.rails.mobile_money),
        ];

        let mut configs: Vec<ServiceClientConfig> = rails
            .into_iter()
            .filter(|(_, rail)| rail.enabled)
            .filter_map(|(name, rail)| {
                rail.base_url.as_ref().map(|url| ServiceClientConfig {
                    request_timeout_ms: rail.request_timeout_ms,
                    retry: self.retry.clone(),
                    breaker: self.breaker.clone(),
                    ..ServiceClientConfig::new(name, url.clone())
                })
            })
            .collect();

        if let Some(url) = &self.anchor.rpc_url {
            // Resending eth_sendTransaction could anchor twice
            configs.push(ServiceClientConfig {
                retry: RetryConfig::none(),
                breaker: self.breaker.clone(),
                ..ServiceClientConfig::new(ANCHOR_NODE_SERVICE, url.clone())
            });
        }

        configs
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, value)),
        Err(_) => Ok(None),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

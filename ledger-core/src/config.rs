//! Anchoring configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anchoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Run the background scheduler
    pub enabled: bool,

    /// JSON-RPC endpoint of the EVM node; a local simulated ledger is used when unset
    pub rpc_url: Option<String>,

    /// Node-managed account that signs anchor transactions
    pub from_address: String,

    /// Recipient of anchor transactions
    pub to_address: String,

    /// Network name recorded on anchors
    pub network: String,

    /// Upper bound on one submission, confirmation included (milliseconds)
    pub submit_timeout_ms: u64,

    /// Scheduler period (seconds)
    pub interval_secs: u64,

    /// Anchor records kept in memory
    pub history_limit: usize,

    /// Delay between receipt polls (milliseconds)
    pub receipt_poll_interval_ms: u64,

    /// Receipt polls before giving up
    pub receipt_poll_attempts: u32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rpc_url: None,
            from_address: "0x0000000000000000000000000000000000000000".to_string(),
            to_address: "0x0000000000000000000000000000000000000000".to_string(),
            network: "sandbox".to_string(),
            submit_timeout_ms: 60_000,   // 1 minute
            interval_secs: 3_600,        // Hourly
            history_limit: 100,
            receipt_poll_interval_ms: 2_000,
            receipt_poll_attempts: 20,
        }
    }
}

impl AnchorConfig {
    /// Submission timeout
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Scheduler period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Receipt poll delay
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnchorConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = AnchorConfig::default();

        if let Ok(url) = std::env::var("ANCHOR_RPC_URL") {
            config.rpc_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(addr) = std::env::var("ANCHOR_FROM_ADDRESS") {
            config.from_address = addr;
        }

        if let Ok(addr) = std::env::var("ANCHOR_TO_ADDRESS") {
            config.to_address = addr;
        }

        if let Ok(network) = std::env::var("ANCHOR_NETWORK") {
            config.network = network;
        }

        if let Ok(enabled) = std::env::var("ANCHOR_ENABLED") {
            config.enabled = parse_var("ANCHOR_ENABLED", &enabled)?;
        }

        if let Ok(value) = std::env::var("ANCHOR_INTERVAL_SECS") {
            config.interval_secs = parse_var("ANCHOR_INTERVAL_SECS", &value)?;
        }

        if let Ok(value) = std::env::var("ANCHOR_SUBMIT_TIMEOUT_MS") {
            config.submit_timeout_ms = parse_var("ANCHOR_SUBMIT_TIMEOUT_MS", &value)?;
        }

        if let Ok(value) = std::env::var("ANCHOR_HISTORY_LIMIT") {
            config.history_limit = parse_var("ANCHOR_HISTORY_LIMIT", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.interval_secs == 0 {
            return Err(crate::Error::Config("interval_secs must be positive".to_string()));
        }
        if self.submit_timeout_ms == 0 {
            return Err(crate::Error::Config("submit_timeout_ms must be positive".to_string()));
        }
        if self.history_limit == 0 {
            return Err(crate::Error::Config("history_limit must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("Invalid value for {}: {}", name, value)))
}

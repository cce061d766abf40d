//! Named downstream dependencies
//!
//! Built once at startup and shared behind an `Arc`; each entry owns its
//! own breaker.

use crate::circuit_breaker::BreakerSnapshot;
use crate::client::{ServiceClient, ServiceClientConfig};
use crate::error::{Error, Result};
use protocol_core::SharedClock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Map of dependency name to client
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    clients: HashMap<String, Arc<ServiceClient>>,
}

impl ServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one client per config entry
    pub fn from_configs(
        configs: impl IntoIterator<Item = ServiceClientConfig>,
        clock: SharedClock,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            let client = ServiceClient::from_config(config, clock.clone())?;
            registry.register(client)?;
        }
        Ok(registry)
    }

    /// Add a client; names must be unique
    pub fn register(&mut self, client: ServiceClient) -> Result<Arc<ServiceClient>> {
        let name = client.name().to_string();
        if self.clients.contains_key(&name) {
            return Err(Error::Config(format!("service {} registered twice", name)));
        }

        info!("Registered downstream service {} at {}", name, client.base_url());
        let client = Arc::new(client);
        self.clients.insert(name, client.clone());
        Ok(client)
    }

    /// Look up a client by name
    pub fn get(&self, name: &str) -> Result<Arc<ServiceClient>> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownService(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Breaker state of every dependency, sorted by name
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .clients
            .values()
            .map(|client| client.breaker().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snapshots
    }
}

//! Shared types for adapters

use protocol_core::Corridor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a rail can carry. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailCapabilities {
    /// ISO 4217 currency codes
    pub currencies: BTreeSet<String>,
    /// Supported corridors
    pub corridors: BTreeSet<Corridor>,
    /// Settles in seconds
    pub supports_instant: bool,
}

impl RailCapabilities {
    /// Build from string lists; corridors use the `"NG->EU"` form
    pub fn new<C, K>(currencies: C, corridors: K, supports_instant: bool) -> protocol_core::Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let corridors = corridors
            .into_iter()
            .map(|c| c.as_ref().parse())
            .collect::<protocol_core::Result<BTreeSet<Corridor>>>()?;

        Ok(Self {
            currencies: currencies.into_iter().map(Into::into).collect(),
            corridors,
            supports_instant,
        })
    }

    /// Currency is carried by this rail
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.currencies.contains(currency)
    }

    /// Corridor is served by this rail
    pub fn supports_corridor(&self, corridor: &Corridor) -> bool {
        self.corridors.contains(corridor)
    }
}

/// Caller preferences for one routing decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutePolicy {
    /// Connector names to try first, in registration order
    pub preferred: Vec<String>,
    /// Only instant rails
    pub instant_required: bool,
    /// Only rails serving this corridor
    pub corridor: Option<Corridor>,
}

impl RoutePolicy {
    /// Prefer the named connectors
    pub fn prefer<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred = names.into_iter().map(Into::into).collect();
        self
    }

    /// Require instant settlement
    pub fn instant(mut self) -> Self {
        self.instant_required = true;
        self
    }

    /// Restrict to a corridor
    pub fn with_corridor(mut self, corridor: Corridor) -> Self {
        self.corridor = Some(corridor);
        self
    }
}

/// How a connector reaches its rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMode {
    /// Accepts locally, no downstream
    Sandbox,
    /// Calls the rail over HTTP
    Remote,
}

impl fmt::Display for ConnectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorMode::Sandbox => write!(f, "sandbox"),
            ConnectorMode::Remote => write!(f, "remote"),
        }
    }
}

/// Operator view of a registered connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    /// Provider name
    pub name: String,
    /// Prefix of references this connector issues
    pub reference_prefix: String,
    /// Sandbox or remote
    pub mode: ConnectorMode,
    /// Capabilities
    pub capabilities: RailCapabilities,
}

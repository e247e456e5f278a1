//! Proxy configuration value types and the fixed candidate search space.
//!
//! A [`ProxyConfiguration`] is one `{engine, transport, routing mode}` triple.
//! The selector walks [`CANDIDATES`] in order when a site keeps failing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration component name was not recognized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseComponentError {
    kind: &'static str,
    value: String,
}

macro_rules! impl_from_str {
    ($ty:ty, $kind:literal) => {
        impl FromStr for $ty {
            type Err = ParseComponentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::parse(s).ok_or_else(|| ParseComponentError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// Components
// =============================================================================

/// Content-rewriting engine used to fetch and rewrite remote pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyEngine {
    /// Ultraviolet.
    #[default]
    #[serde(rename = "uv")]
    Ultraviolet,
    /// Scramjet.
    #[serde(rename = "sj")]
    Scramjet,
}

impl ProxyEngine {
    /// Returns the short engine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyEngine::Ultraviolet => "uv",
            ProxyEngine::Scramjet => "sj",
        }
    }

    /// Parses an engine from its short or long name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "uv" | "ultraviolet" => Some(ProxyEngine::Ultraviolet),
            "sj" | "scramjet" => Some(ProxyEngine::Scramjet),
            _ => None,
        }
    }
}

/// Network tunneling implementation carrying proxied traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Epoxy.
    #[default]
    Epoxy,
    /// Libcurl.
    Libcurl,
}

impl Transport {
    /// Returns the transport name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Epoxy => "epoxy",
            Transport::Libcurl => "libcurl",
        }
    }

    /// Parses a transport from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "epoxy" => Some(Transport::Epoxy),
            "libcurl" => Some(Transport::Libcurl),
            _ => None,
        }
    }
}

/// Whether traffic goes through the WebSocket tunnel or the HTTP relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Wisp WebSocket tunnel.
    #[default]
    Wisp,
    /// Bare HTTP relay.
    Bare,
}

impl RoutingMode {
    /// Returns the routing mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Wisp => "wisp",
            RoutingMode::Bare => "bare",
        }
    }

    /// Parses a routing mode from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wisp" => Some(RoutingMode::Wisp),
            "bare" => Some(RoutingMode::Bare),
            _ => None,
        }
    }
}

impl_from_str!(ProxyEngine, "proxy engine");
impl_from_str!(Transport, "transport");
impl_from_str!(RoutingMode, "routing mode");

// =============================================================================
// Configuration
// =============================================================================

/// One `{engine, transport, routing mode}` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfiguration {
    /// Proxy engine.
    #[serde(rename = "proxy")]
    pub proxy_engine: ProxyEngine,
    /// Transport.
    pub transport: Transport,
    /// Routing mode.
    pub routing_mode: RoutingMode,
}

impl ProxyConfiguration {
    /// Creates a configuration from its three components.
    pub const fn new(
        proxy_engine: ProxyEngine,
        transport: Transport,
        routing_mode: RoutingMode,
    ) -> Self {
        Self {
            proxy_engine,
            transport,
            routing_mode,
        }
    }
}

impl std::fmt::Display for ProxyConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "proxy={}, transport={}, routingMode={}",
            self.proxy_engine.as_str(),
            self.transport.as_str(),
            self.routing_mode.as_str()
        )
    }
}

/// Ordered list of configurations tried on failure.
pub type ConfigurationCandidateList = [ProxyConfiguration; 6];

/// The full search space, most broadly compatible first.
///
/// Index 0 is the default starting point, so site overrides never store it.
pub const CANDIDATES: ConfigurationCandidateList = [
    ProxyConfiguration::new(ProxyEngine::Ultraviolet, Transport::Epoxy, RoutingMode::Wisp),
    ProxyConfiguration::new(ProxyEngine::Ultraviolet, Transport::Libcurl, RoutingMode::Wisp),
    ProxyConfiguration::new(ProxyEngine::Ultraviolet, Transport::Epoxy, RoutingMode::Bare),
    ProxyConfiguration::new(ProxyEngine::Scramjet, Transport::Epoxy, RoutingMode::Wisp),
    ProxyConfiguration::new(ProxyEngine::Scramjet, Transport::Libcurl, RoutingMode::Wisp),
    ProxyConfiguration::new(ProxyEngine::Scramjet, Transport::Epoxy, RoutingMode::Bare),
];

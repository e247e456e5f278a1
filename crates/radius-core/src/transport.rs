//! Transport planning and the collaborator boundary.
//!
//! A [`ProxyConfiguration`] is turned into a [`TransportDescriptor`]: the
//! transport module the page must install and the argument it is installed
//! with. Installing it is the job of a [`TransportApplier`], which owns the
//! single shared connection object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::{ProxyConfiguration, RoutingMode, Transport};

/// Module installed for the bare relay.
pub const BARE_TRANSPORT_MODULE: &str = "/baremod/index.mjs";

/// Module installed for Epoxy over wisp.
pub const EPOXY_TRANSPORT_MODULE: &str = "/epoxy/index.mjs";

/// Module installed for Libcurl over wisp.
pub const LIBCURL_TRANSPORT_MODULE: &str = "/libcurl/index.mjs";

/// Errors raised while applying a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The transport could not be initialized.
    #[error("transport initialization failed: {0}")]
    Initialization(String),

    /// No connection object is available yet.
    #[error("transport connection not ready")]
    NotReady,
}

/// Server endpoints a transport connects through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEndpoints {
    /// Wisp server URL (e.g. `wss://host/wisp/`).
    pub wisp_server: String,
    /// Bare server URL (e.g. `https://host/bare/`).
    pub bare_server: String,
    /// Route wisp traffic through the ad-blocking endpoint.
    pub ad_block: bool,
}

impl Default for TransportEndpoints {
    fn default() -> Self {
        Self::for_origin("http", "localhost:8080")
    }
}

impl TransportEndpoints {
    /// Derives both endpoints from a page origin.
    pub fn for_origin(scheme: &str, host: &str) -> Self {
        let secure = scheme.eq_ignore_ascii_case("https");
        Self {
            wisp_server: format!("{}://{}/wisp/", if secure { "wss" } else { "ws" }, host),
            bare_server: format!("{}://{}/bare/", if secure { "https" } else { "http" }, host),
            ad_block: false,
        }
    }

    /// Returns the wisp URL, switched to the ad-blocking path when enabled.
    pub fn effective_wisp_server(&self) -> String {
        if self.ad_block {
            self.wisp_server.replace("/wisp/", "/adblock/")
        } else {
            self.wisp_server.clone()
        }
    }
}

/// Argument passed to the transport module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportArgument {
    /// Wisp-based transports take `{ "wisp": url }`.
    Wisp {
        /// Wisp server URL.
        wisp: String,
    },
    /// The bare relay takes the server URL directly.
    Bare(String),
}

/// Everything needed to install a configuration on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDescriptor {
    /// The configuration this descriptor realizes.
    pub configuration: ProxyConfiguration,
    /// Transport module path.
    pub module: String,
    /// Module argument.
    pub argument: TransportArgument,
}

impl TransportDescriptor {
    /// Plans the transport for a configuration.
    pub fn plan(configuration: ProxyConfiguration, endpoints: &TransportEndpoints) -> Self {
        let (module, argument) = match configuration.routing_mode {
            RoutingMode::Bare => (
                BARE_TRANSPORT_MODULE,
                TransportArgument::Bare(endpoints.bare_server.clone()),
            ),
            RoutingMode::Wisp => {
                let module = match configuration.transport {
                    Transport::Libcurl => LIBCURL_TRANSPORT_MODULE,
                    Transport::Epoxy => EPOXY_TRANSPORT_MODULE,
                };
                (
                    module,
                    TransportArgument::Wisp {
                        wisp: endpoints.effective_wisp_server(),
                    },
                )
            }
        };

        Self {
            configuration,
            module: module.to_string(),
            argument,
        }
    }
}

/// Installs transports on the shared connection object.
///
/// Implementations are called from one task at a time; the selector never
/// starts a second apply before the previous one resolved.
#[async_trait]
pub trait TransportApplier: Send + Sync {
    /// Installs the described transport.
    async fn apply(&self, descriptor: &TransportDescriptor) -> Result<(), ApplyError>;
}

/// Redirects the page.
pub trait Navigator: Send + Sync {
    /// Navigates to a path on the proxy origin.
    fn navigate(&self, path: &str);
}

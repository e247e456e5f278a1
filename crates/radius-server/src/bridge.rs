//! Page-side collaborators exposed over HTTP.
//!
//! The selector installs transports and requests redirects; the page picks
//! both up by polling the API. [`SharedTransport`] holds the single
//! installed transport, [`PendingNavigation`] the next redirect.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use radius_core::transport::{ApplyError, Navigator, TransportApplier, TransportDescriptor};

/// The transport the page should currently use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledTransport {
    /// What to install.
    #[serde(flatten)]
    pub descriptor: TransportDescriptor,
    /// When the selector installed it.
    pub installed_at: DateTime<Utc>,
    /// Increments on every install, so the page can spot changes.
    pub revision: u64,
}

/// The one shared connection slot.
#[derive(Debug, Clone, Default)]
pub struct SharedTransport {
    current: Arc<RwLock<Option<InstalledTransport>>>,
}

impl SharedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the installed transport, if any.
    pub fn current(&self) -> Option<InstalledTransport> {
        self.current.read().clone()
    }
}

#[async_trait]
impl TransportApplier for SharedTransport {
    async fn apply(&self, descriptor: &TransportDescriptor) -> Result<(), ApplyError> {
        let mut slot = self.current.write();
        let revision = slot.as_ref().map_or(1, |t| t.revision + 1);
        info!(
            "Installing transport {} ({})",
            descriptor.module, descriptor.configuration
        );
        *slot = Some(InstalledTransport {
            descriptor: descriptor.clone(),
            installed_at: Utc::now(),
            revision,
        });
        Ok(())
    }
}

/// A redirect waiting to be picked up by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationRequest {
    pub path: String,
    pub requested_at: DateTime<Utc>,
}

/// Holds at most one pending redirect; a newer one replaces it.
#[derive(Debug, Clone, Default)]
pub struct PendingNavigation {
    pending: Arc<Mutex<Option<NavigationRequest>>>,
}

impl PendingNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the pending redirect.
    pub fn take(&self) -> Option<NavigationRequest> {
        self.pending.lock().take()
    }
}

impl Navigator for PendingNavigation {
    fn navigate(&self, path: &str) {
        debug!("Queueing redirect to {}", path);
        *self.pending.lock() = Some(NavigationRequest {
            path: path.to_string(),
            requested_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::configuration::CANDIDATES;
    use radius_core::transport::TransportEndpoints;

    #[tokio::test]
    async fn install_bumps_revision() {
        let transport = SharedTransport::new();
        assert!(transport.current().is_none());

        let endpoints = TransportEndpoints::default();
        tokio_test::assert_ok!(
            transport
                .apply(&TransportDescriptor::plan(CANDIDATES[0], &endpoints))
                .await
        );
        tokio_test::assert_ok!(
            transport
                .apply(&TransportDescriptor::plan(CANDIDATES[2], &endpoints))
                .await
        );

        let current = transport.current().unwrap();
        assert_eq!(current.revision, 2);
        assert_eq!(current.descriptor.configuration, CANDIDATES[2]);
        assert_eq!(current.descriptor.module, "/baremod/index.mjs");
    }

    #[test]
    fn navigation_is_taken_once() {
        let nav = PendingNavigation::new();
        nav.navigate("/404");
        assert_eq!(nav.take().unwrap().path, "/404");
        assert!(nav.take().is_none());
    }
}

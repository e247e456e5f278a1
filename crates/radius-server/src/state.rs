//! Application state for the API server.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use radius_core::selector::{ConfigurationSelector, SelectorConfig, SelectorHandle, SelectorService};
use radius_core::site_table::SiteConfigTable;
use radius_core::transport::TransportEndpoints;
use radius_storage::{DurableStorage, KvOverrideStore, KvStore, MemoryStorage, Settings};

use crate::bridge::{PendingNavigation, SharedTransport};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the selector task.
    pub selector: SelectorHandle,
    /// Persisted user settings.
    pub settings: Settings,
    /// Persisted site overrides (read side).
    pub overrides: KvOverrideStore,
    /// Static site knowledge.
    pub sites: Arc<SiteConfigTable>,
    /// Transport installed for the page.
    pub transport: SharedTransport,
    /// Redirect waiting for the page.
    pub navigation: PendingNavigation,
    /// Endpoints used when settings do not override them.
    pub endpoint_defaults: TransportEndpoints,
}

impl AppState {
    /// Wires settings, overrides and the selector over one storage backend
    /// and starts the selector task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_storage(
        backend: Arc<dyn DurableStorage>,
        selector_config: SelectorConfig,
        endpoint_defaults: TransportEndpoints,
    ) -> (Self, JoinHandle<()>) {
        let kv = KvStore::settings(backend);
        let settings = Settings::new(kv.clone());
        let overrides = KvOverrideStore::new(kv);
        let sites = Arc::new(SiteConfigTable::with_defaults());
        let transport = SharedTransport::new();
        let navigation = PendingNavigation::new();

        let endpoints = settings.endpoints(&endpoint_defaults);
        let enabled = settings.dynamic_loading();
        info!(
            "Dynamic configuration selection is {}",
            if enabled { "enabled" } else { "disabled" }
        );

        let selector = ConfigurationSelector::new(
            Arc::new(transport.clone()),
            Arc::new(navigation.clone()),
            Arc::new(overrides.clone()),
        )
        .with_config(selector_config)
        .with_site_table(sites.as_ref().clone())
        .with_active(settings.configuration())
        .with_endpoints(endpoints)
        .with_enabled(enabled);

        let (selector, task) = SelectorService::spawn(selector);

        let state = Self {
            selector,
            settings,
            overrides,
            sites,
            transport,
            navigation,
            endpoint_defaults,
        };
        (state, task)
    }

    /// Creates state over in-process storage (for testing).
    pub fn in_memory() -> Self {
        let (state, _task) = Self::from_storage(
            Arc::new(MemoryStorage::new()),
            SelectorConfig::default(),
            TransportEndpoints::default(),
        );
        state
    }

    /// Endpoints after applying the stored settings.
    pub fn endpoints(&self) -> TransportEndpoints {
        self.settings.endpoints(&self.endpoint_defaults)
    }
}

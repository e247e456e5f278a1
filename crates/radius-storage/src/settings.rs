//! Typed view over the persisted user settings.
//!
//! Values are stored as plain strings in the `radius||settings` namespace.
//! Booleans are `"true"`/`"false"`; anything unreadable falls back to the
//! default.

use radius_core::configuration::{ProxyConfiguration, ProxyEngine, RoutingMode, Transport};
use radius_core::transport::TransportEndpoints;
use serde::{Deserialize, Serialize};

use crate::kv_store::KvStore;

/// Setting keys.
pub mod keys {
    pub const PROXY: &str = "proxy";
    pub const TRANSPORT: &str = "transport";
    pub const ROUTING_MODE: &str = "routingMode";
    pub const WISP_SERVER: &str = "wispServer";
    pub const AD_BLOCK: &str = "adBlock";
    pub const DYNAMIC_LOADING: &str = "experimentDynamicLoading";
}

/// Every setting at once, as exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub configuration: ProxyConfiguration,
    pub wisp_server: Option<String>,
    pub ad_block: bool,
    pub dynamic_loading: bool,
}

/// Typed accessors for the settings namespace.
#[derive(Debug, Clone)]
pub struct Settings {
    kv: KvStore,
}

impl Settings {
    /// Wraps a store; keys are resolved in its namespace.
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Returns the underlying store.
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// The user's chosen configuration.
    pub fn configuration(&self) -> ProxyConfiguration {
        let proxy_engine = self
            .kv
            .get(keys::PROXY)
            .and_then(|v| ProxyEngine::parse(&v))
            .unwrap_or_default();
        let transport = self
            .kv
            .get(keys::TRANSPORT)
            .and_then(|v| Transport::parse(&v))
            .unwrap_or_default();
        let routing_mode = self
            .kv
            .get(keys::ROUTING_MODE)
            .and_then(|v| RoutingMode::parse(&v))
            .unwrap_or_default();

        ProxyConfiguration::new(proxy_engine, transport, routing_mode)
    }

    /// Persists the user's chosen configuration.
    pub fn set_configuration(&self, configuration: ProxyConfiguration) {
        self.kv.set(keys::PROXY, configuration.proxy_engine.as_str());
        self.kv.set(keys::TRANSPORT, configuration.transport.as_str());
        self.kv
            .set(keys::ROUTING_MODE, configuration.routing_mode.as_str());
    }

    /// Custom wisp server, if one was set.
    pub fn wisp_server(&self) -> Option<String> {
        self.kv.get(keys::WISP_SERVER).filter(|v| !v.trim().is_empty())
    }

    /// Sets or clears the custom wisp server.
    pub fn set_wisp_server(&self, url: Option<&str>) {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => self.kv.set(keys::WISP_SERVER, url),
            None => self.kv.remove(keys::WISP_SERVER),
        }
    }

    /// Whether wisp traffic goes through the ad-blocking endpoint.
    pub fn ad_block(&self) -> bool {
        self.flag(keys::AD_BLOCK)
    }

    pub fn set_ad_block(&self, enabled: bool) {
        self.kv.set(keys::AD_BLOCK, &enabled.to_string());
    }

    /// Whether dynamic configuration selection is on. Off unless set.
    pub fn dynamic_loading(&self) -> bool {
        self.flag(keys::DYNAMIC_LOADING)
    }

    pub fn set_dynamic_loading(&self, enabled: bool) {
        self.kv.set(keys::DYNAMIC_LOADING, &enabled.to_string());
    }

    /// Resolves transport endpoints, starting from `defaults`.
    pub fn endpoints(&self, defaults: &TransportEndpoints) -> TransportEndpoints {
        TransportEndpoints {
            wisp_server: self
                .wisp_server()
                .unwrap_or_else(|| defaults.wisp_server.clone()),
            bare_server: defaults.bare_server.clone(),
            ad_block: self.ad_block(),
        }
    }

    /// Reads every setting.
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            configuration: self.configuration(),
            wisp_server: self.wisp_server(),
            ad_block: self.ad_block(),
            dynamic_loading: self.dynamic_loading(),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.kv.get(key).as_deref() == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::{DurableStorage, MemoryStorage};
    use radius_core::configuration::CANDIDATES;
    use std::sync::Arc;

    fn setup() -> (Settings, MemoryStorage) {
        let backend = MemoryStorage::new();
        let settings = Settings::new(KvStore::settings(Arc::new(backend.clone())));
        (settings, backend)
    }

    #[test]
    fn defaults_when_empty() {
        let (settings, _) = setup();
        assert_eq!(settings.configuration(), ProxyConfiguration::default());
        assert!(!settings.ad_block());
        assert!(!settings.dynamic_loading());
        assert_eq!(settings.wisp_server(), None);
    }

    #[test]
    fn configuration_round_trip() {
        let (settings, backend) = setup();
        settings.set_configuration(CANDIDATES[5]);
        assert_eq!(settings.configuration(), CANDIDATES[5]);
        assert_eq!(
            backend.get("radius||settings||proxy").unwrap(),
            Some("sj".to_string())
        );
        assert_eq!(
            backend.get("radius||settings||routingMode").unwrap(),
            Some("bare".to_string())
        );
    }

    #[test]
    fn unreadable_components_fall_back() {
        let (settings, backend) = setup();
        backend.set("radius||settings||proxy", "rammerhead").unwrap();
        backend.set("radius||settings||transport", "libcurl").unwrap();
        assert_eq!(
            settings.configuration(),
            ProxyConfiguration::new(ProxyEngine::Ultraviolet, Transport::Libcurl, RoutingMode::Wisp)
        );
    }

    #[test]
    fn flags_require_literal_true() {
        let (settings, backend) = setup();
        backend.set("radius||settings||adBlock", "yes").unwrap();
        assert!(!settings.ad_block());

        settings.set_dynamic_loading(true);
        assert!(settings.dynamic_loading());
        settings.set_dynamic_loading(false);
        assert!(!settings.dynamic_loading());
    }

    #[test]
    fn endpoints_prefer_stored_wisp_server() {
        let (settings, _) = setup();
        let defaults = TransportEndpoints::for_origin("https", "radius.test");

        assert_eq!(settings.endpoints(&defaults), defaults);

        settings.set_wisp_server(Some("wss://other.test/wisp/"));
        settings.set_ad_block(true);
        let e = settings.endpoints(&defaults);
        assert_eq!(e.wisp_server, "wss://other.test/wisp/");
        assert_eq!(e.bare_server, defaults.bare_server);
        assert_eq!(e.effective_wisp_server(), "wss://other.test/adblock/");

        settings.set_wisp_server(Some("  "));
        assert_eq!(settings.wisp_server(), None);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let (settings, _) = setup();
        settings.set_dynamic_loading(true);
        let json = serde_json::to_value(settings.snapshot()).unwrap();
        assert_eq!(json["dynamicLoading"], true);
        assert_eq!(json["configuration"]["proxy"], "uv");
        assert!(json["wispServer"].is_null());
    }
}

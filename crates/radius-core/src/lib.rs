//! Radius Core - dynamic proxy configuration selection.
//!
//! Picks, per visited site, the proxy engine / transport / routing mode
//! combination most likely to load it, and walks a fixed list of fallbacks
//! when the page keeps reporting critical errors.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radius_core::overrides::MemoryOverrideStore;
//! use radius_core::selector::{ConfigurationSelector, SelectorService};
//! # use radius_core::transport::{ApplyError, Navigator, TransportApplier, TransportDescriptor};
//! # struct Page;
//! # #[async_trait::async_trait]
//! # impl TransportApplier for Page {
//! #     async fn apply(&self, _: &TransportDescriptor) -> Result<(), ApplyError> { Ok(()) }
//! # }
//! # impl Navigator for Page { fn navigate(&self, _: &str) {} }
//! # async fn run() {
//! let page = Arc::new(Page);
//! let selector =
//!     ConfigurationSelector::new(page.clone(), page, Arc::new(MemoryOverrideStore::new()));
//! let (handle, _task) = SelectorService::spawn(selector);
//!
//! let entered = handle.enter_site("https://discord.com/app").await;
//! # }
//! ```

pub mod configuration;
pub mod error_classifier;
pub mod overrides;
pub mod selector;
pub mod site_table;
pub mod transport;

pub use configuration::{
    ConfigurationCandidateList, ProxyConfiguration, ProxyEngine, RoutingMode, Transport,
    CANDIDATES,
};
pub use error_classifier::{Classification, ErrorClassifier};
pub use overrides::{MemoryOverrideStore, OverrideStore, SiteOverrides};
pub use selector::{
    ConfigurationSelector, EnterOutcome, EntrySource, ErrorReport, ErrorSource, SelectorConfig,
    SelectorHandle, SelectorService, SelectorState, SelectorStatus, SwitchOutcome,
};
pub use site_table::{domain_of, normalize_domain, SiteConfig, SiteConfigTable};
pub use transport::{
    ApplyError, Navigator, TransportApplier, TransportArgument, TransportDescriptor,
    TransportEndpoints,
};

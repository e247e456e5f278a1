//! Configuration selection engine.
//!
//! [`ConfigurationSelector`] owns one page session and walks the candidate
//! list when critical errors pile up:
//!
//! - Entering a site applies a saved override, the site's preferred
//!   configuration, or nothing (in that order of preference)
//! - Critical errors are buffered; the owning service flushes the buffer
//!   after a quiet period and switches when it holds enough errors
//! - Each switch advances to the next candidate and remembers it per domain
//! - Running off the end of the list sends the page to the failure path
//! - Leaving restores whatever was active before the session began
//!
//! The engine is not thread-safe by itself. It is driven either directly
//! (tests, single-task embedders) or through
//! [`SelectorService`](super::SelectorService), which serializes every
//! transition on one task.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::session::{Advance, SelectorSession, SelectorState};
use crate::configuration::{ProxyConfiguration, ProxyEngine, CANDIDATES};
use crate::error_classifier::{Classification, ErrorClassifier};
use crate::overrides::{OverrideStore, SiteOverrides};
use crate::site_table::{domain_of, normalize_domain, SiteConfigTable};
use crate::transport::{Navigator, TransportApplier, TransportDescriptor, TransportEndpoints};

/// Number of buffered critical errors that triggers a switch.
pub const DEFAULT_ERROR_THRESHOLD: usize = 3;

/// Quiet period before the error buffer is evaluated.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Page shown once every candidate has failed.
pub const DEFAULT_FAILURE_PATH: &str = "/404";

/// Number of switch records kept for status reporting.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Buffered critical errors needed to switch.
    pub error_threshold: usize,
    /// Quiet period after the last critical error.
    pub debounce: Duration,
    /// Redirect target on exhaustion.
    pub failure_path: String,
    /// Switch records retained.
    pub history_limit: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE,
            failure_path: DEFAULT_FAILURE_PATH.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SelectorConfig {
    /// Sets the error threshold (minimum 1).
    pub fn with_error_threshold(mut self, threshold: usize) -> Self {
        self.error_threshold = threshold.max(1);
        self
    }

    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the exhaustion redirect path.
    pub fn with_failure_path(mut self, path: impl Into<String>) -> Self {
        self.failure_path = path.into();
        self
    }
}

// =============================================================================
// Reports and outcomes
// =============================================================================

/// Where an error report came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// Uncaught page error.
    #[default]
    Window,
    /// Unhandled promise rejection.
    Rejection,
    /// Console error output.
    Console,
}

/// A free-text error observed on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Report origin.
    #[serde(default)]
    pub source: ErrorSource,
    /// Error text.
    pub message: String,
}

impl ErrorReport {
    /// Creates a report.
    pub fn new(source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }

    /// Creates a report from an uncaught page error.
    pub fn window(message: impl Into<String>) -> Self {
        Self::new(ErrorSource::Window, message)
    }
}

/// How the configuration for an entered site was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Dynamic selection is off; nothing changed.
    Disabled,
    /// The URL had no usable host; nothing changed.
    Invalid,
    /// The site was already entered.
    Unchanged,
    /// A saved per-domain override.
    Override,
    /// The site's preferred configuration.
    SiteTable,
    /// Nothing known; the active configuration is kept.
    Active,
}

/// Result of entering a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnterOutcome {
    /// Normalized domain of the site.
    pub domain: String,
    /// Engine the page should load through.
    pub engine: ProxyEngine,
    /// Configuration in effect after entry.
    pub configuration: ProxyConfiguration,
    /// Candidate index the session starts from.
    pub index: usize,
    /// How the configuration was chosen.
    pub source: EntrySource,
}

/// Result of trying the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// Moved to a new candidate.
    Switched {
        /// Candidate index.
        index: usize,
        /// Candidate configuration.
        configuration: ProxyConfiguration,
        /// Whether the transport accepted it.
        applied: bool,
    },
    /// Every candidate was tried; the page was redirected.
    Exhausted,
    /// No site is entered, or selection is disabled.
    Inactive,
}

/// Result of observing one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorObservation {
    /// Classifier verdict.
    pub classification: Classification,
    /// Whether the error was added to the session buffer.
    pub buffered: bool,
}

/// Why a switch happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    /// Enough critical errors within the debounce window.
    ErrorThreshold,
    /// Requested by the user.
    Manual,
}

/// One entry of the switch history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchRecord {
    /// When the switch happened.
    pub at: DateTime<Utc>,
    /// Domain the switch was made for.
    pub domain: String,
    /// Candidate index reached.
    pub index: usize,
    /// Candidate configuration.
    pub configuration: ProxyConfiguration,
    /// Trigger.
    pub reason: SwitchReason,
    /// Whether the transport accepted it.
    pub applied: bool,
}

/// Point-in-time view of the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorStatus {
    pub enabled: bool,
    pub state: SelectorState,
    pub current_site: Option<String>,
    pub config_index: usize,
    pub active: ProxyConfiguration,
    pub original: Option<ProxyConfiguration>,
    pub buffered_errors: usize,
    pub override_count: usize,
    pub history: Vec<SwitchRecord>,
}

// =============================================================================
// Selector
// =============================================================================

/// The configuration selection state machine.
pub struct ConfigurationSelector {
    config: SelectorConfig,
    table: SiteConfigTable,
    classifier: ErrorClassifier,
    applier: Arc<dyn TransportApplier>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn OverrideStore>,
    overrides: SiteOverrides,
    endpoints: TransportEndpoints,
    session: SelectorSession,
    state: SelectorState,
    active: ProxyConfiguration,
    enabled: bool,
    history: VecDeque<SwitchRecord>,
}

impl std::fmt::Debug for ConfigurationSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationSelector")
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("active", &self.active)
            .field("session", &self.session)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

impl ConfigurationSelector {
    /// Creates a selector with default tunables and the bundled site table.
    ///
    /// Saved overrides are loaded from `store` immediately.
    pub fn new(
        applier: Arc<dyn TransportApplier>,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn OverrideStore>,
    ) -> Self {
        let overrides = store.load();
        if !overrides.is_empty() {
            debug!("Loaded {} site override(s)", overrides.len());
        }

        Self {
            config: SelectorConfig::default(),
            table: SiteConfigTable::with_defaults(),
            classifier: ErrorClassifier::new(),
            applier,
            navigator,
            store,
            overrides,
            endpoints: TransportEndpoints::default(),
            session: SelectorSession::new(),
            state: SelectorState::Idle,
            active: ProxyConfiguration::default(),
            enabled: true,
            history: VecDeque::new(),
        }
    }

    /// Replaces the tunables.
    pub fn with_config(mut self, config: SelectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the site table.
    pub fn with_site_table(mut self, table: SiteConfigTable) -> Self {
        self.table = table;
        self
    }

    /// Sets the configuration assumed to be installed at startup.
    pub fn with_active(mut self, configuration: ProxyConfiguration) -> Self {
        self.active = configuration;
        self
    }

    /// Sets the transport endpoints.
    pub fn with_endpoints(mut self, endpoints: TransportEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Enables or disables dynamic selection at startup.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    // ==================== Accessors ====================

    /// Returns the tunables.
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Returns the configuration currently installed.
    pub fn active(&self) -> ProxyConfiguration {
        self.active
    }

    /// Returns the engine of the installed configuration.
    pub fn active_engine(&self) -> ProxyEngine {
        self.active.proxy_engine
    }

    /// Returns the session bookkeeping.
    pub fn session(&self) -> &SelectorSession {
        &self.session
    }

    /// Returns whether dynamic selection is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the in-memory override table.
    pub fn overrides(&self) -> &SiteOverrides {
        &self.overrides
    }

    /// Number of domains with a saved override.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Returns the current transport endpoints.
    pub fn endpoints(&self) -> &TransportEndpoints {
        &self.endpoints
    }

    /// Builds a status snapshot.
    pub fn status(&self) -> SelectorStatus {
        SelectorStatus {
            enabled: self.enabled,
            state: self.state,
            current_site: self.session.current_site().map(str::to_string),
            config_index: self.session.config_index(),
            active: self.active,
            original: self.session.original(),
            buffered_errors: self.session.buffered_errors().len(),
            override_count: self.overrides.len(),
            history: self.history.iter().cloned().collect(),
        }
    }

    // ==================== Session lifecycle ====================

    /// Enters the site at `url` and installs the best known configuration.
    ///
    /// Entering a different site while one is active first leaves the old
    /// one, so the saved original configuration always predates the session.
    pub async fn enter_site(&mut self, url: &str) -> EnterOutcome {
        let domain = domain_of(url).unwrap_or_else(|| normalize_domain(url));

        if !self.enabled {
            return self.outcome(domain, 0, EntrySource::Disabled);
        }
        if domain.is_empty() {
            debug!("Ignoring site entry without a host: {:?}", url);
            return self.outcome(domain, 0, EntrySource::Invalid);
        }

        if let Some(current) = self.session.current_site() {
            if current == domain {
                let index = self.session.config_index();
                return self.outcome(domain, index, EntrySource::Unchanged);
            }
            info!("Switching site from {} to {}", current, domain);
            self.leave_site().await;
        }

        let active = self.active;

        if let Some(index) = self.overrides.get(&domain) {
            info!(
                "Entering {} with saved override {} ({})",
                domain, index, CANDIDATES[index]
            );
            self.begin(domain.clone(), active, index);
            self.apply(CANDIDATES[index]).await;
            return self.outcome(domain, index, EntrySource::Override);
        }

        if let Some(site) = self.table.lookup_domain(&domain) {
            let preferred = site.configuration;
            info!(
                "Entering {} with preferred configuration of {} ({})",
                domain, site.name, preferred
            );
            self.begin(domain.clone(), active, 0);
            self.session.prefer(preferred);
            self.apply(preferred).await;
            return self.outcome(domain, 0, EntrySource::SiteTable);
        }

        debug!("Entering {} with active configuration ({})", domain, active);
        self.begin(domain.clone(), active, 0);
        self.outcome(domain, 0, EntrySource::Active)
    }

    /// Leaves the current site and restores the original configuration.
    ///
    /// Returns false when no site was entered.
    pub async fn leave_site(&mut self) -> bool {
        let Some(original) = self.session.original() else {
            return false;
        };

        info!(
            "Leaving {}, restoring {}",
            self.session.current_site().unwrap_or_default(),
            original
        );
        self.apply(original).await;
        self.session.reset();
        self.state = SelectorState::Idle;
        true
    }

    /// Drops the session without touching the transport.
    pub fn abandon(&mut self) {
        if self.session.is_active() {
            debug!(
                "Abandoning session for {}",
                self.session.current_site().unwrap_or_default()
            );
        }
        self.session.reset();
        self.state = SelectorState::Idle;
    }

    // ==================== Errors ====================

    /// Classifies an error and buffers it when critical.
    ///
    /// The caller owns the debounce timer: when `buffered` is true it must
    /// (re)arm the timer and call [`process_buffer`](Self::process_buffer)
    /// once it fires.
    pub fn observe_error(&mut self, report: &ErrorReport) -> ErrorObservation {
        let classification = self.classifier.classify(&report.message);
        debug!(
            source = ?report.source,
            "Classified error as {:?}: {}",
            classification,
            report.message
        );

        let buffered = classification.is_critical() && self.enabled && self.session.is_active();
        if buffered {
            self.session.push_error(report.message.clone());
        }

        ErrorObservation {
            classification,
            buffered,
        }
    }

    /// Evaluates and clears the error buffer.
    ///
    /// Returns the switch outcome when the threshold was reached.
    pub async fn process_buffer(&mut self) -> Option<SwitchOutcome> {
        let errors = self.session.take_errors();
        if !self.session.is_active() || errors.is_empty() {
            return None;
        }

        if errors.len() < self.config.error_threshold {
            debug!(
                "{} critical error(s) below threshold {}, staying on candidate {}",
                errors.len(),
                self.config.error_threshold,
                self.session.config_index()
            );
            return None;
        }

        info!(
            "{} critical errors on {}, trying next configuration",
            errors.len(),
            self.session.current_site().unwrap_or_default()
        );
        Some(self.try_next(SwitchReason::ErrorThreshold).await)
    }

    // ==================== Switching ====================

    /// Switches to the next candidate on user request.
    pub async fn manual_switch(&mut self) -> SwitchOutcome {
        if !self.enabled {
            return SwitchOutcome::Inactive;
        }
        self.try_next(SwitchReason::Manual).await
    }

    /// Advances to the next candidate, or exhausts the list.
    pub async fn try_next(&mut self, reason: SwitchReason) -> SwitchOutcome {
        let Some(domain) = self.session.current_site().map(str::to_string) else {
            return SwitchOutcome::Inactive;
        };

        self.state = SelectorState::Switching;

        let index = loop {
            match self.session.advance(CANDIDATES.len()) {
                Advance::Candidate(index)
                    if self.session.preferred() == Some(CANDIDATES[index]) =>
                {
                    debug!("Skipping candidate {}, already tried on entry", index);
                }
                Advance::Candidate(index) => break index,
                Advance::Exhausted => {
                    self.exhaust(&domain);
                    return SwitchOutcome::Exhausted;
                }
            }
        };

        let configuration = CANDIDATES[index];
        info!(
            "Switching {} to candidate {}/{} ({})",
            domain,
            index + 1,
            CANDIDATES.len(),
            configuration
        );

        let applied = self.apply(configuration).await;
        if applied && self.overrides.set(&domain, index) {
            self.store.save(&self.overrides);
        }

        self.session.take_errors();
        self.record(SwitchRecord {
            at: Utc::now(),
            domain,
            index,
            configuration,
            reason,
            applied,
        });
        self.state = SelectorState::Active;

        SwitchOutcome::Switched {
            index,
            configuration,
            applied,
        }
    }

    fn exhaust(&mut self, domain: &str) {
        warn!(
            "All {} configurations failed for {}, redirecting to {}",
            CANDIDATES.len(),
            domain,
            self.config.failure_path
        );
        self.state = SelectorState::Exhausted;
        self.session.reset();
        self.navigator.navigate(&self.config.failure_path);
        self.state = SelectorState::Idle;
    }

    // ==================== Settings ====================

    /// Installs a configuration chosen by the user.
    ///
    /// Returns whether the transport accepted it. During a session the saved
    /// original is left alone, so leaving still restores the pre-session
    /// configuration.
    pub async fn apply_user_configuration(&mut self, configuration: ProxyConfiguration) -> bool {
        info!("Applying user configuration {}", configuration);
        self.apply(configuration).await
    }

    /// Turns dynamic selection on or off.
    ///
    /// Turning it off drops buffered errors; a running session can still be
    /// left, which restores the original configuration.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(
                "Dynamic configuration selection {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enabled;
        if !enabled {
            self.session.take_errors();
        }
    }

    /// Replaces the transport endpoints used by later applies.
    pub fn set_endpoints(&mut self, endpoints: TransportEndpoints) {
        self.endpoints = endpoints;
    }

    /// Forgets every saved override.
    pub fn clear_overrides(&mut self) {
        info!("Clearing {} site override(s)", self.overrides.len());
        self.overrides.clear();
        self.store.clear();
    }

    // ==================== Internals ====================

    fn begin(&mut self, domain: String, active: ProxyConfiguration, index: usize) {
        self.session.begin(domain, active, index);
        self.state = SelectorState::Active;
    }

    async fn apply(&mut self, configuration: ProxyConfiguration) -> bool {
        let descriptor = TransportDescriptor::plan(configuration, &self.endpoints);
        match self.applier.apply(&descriptor).await {
            Ok(()) => {
                self.active = configuration;
                true
            }
            Err(e) => {
                warn!("Failed to apply {}: {}", configuration, e);
                false
            }
        }
    }

    fn record(&mut self, record: SwitchRecord) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    fn outcome(&self, domain: String, index: usize, source: EntrySource) -> EnterOutcome {
        EnterOutcome {
            domain,
            engine: self.active.proxy_engine,
            configuration: self.active,
            index,
            source,
        }
    }
}

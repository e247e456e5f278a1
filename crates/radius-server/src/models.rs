//! API request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use radius_core::configuration::{ProxyConfiguration, ProxyEngine};
use radius_core::error_classifier::Classification;
use radius_core::selector::{EntrySource, ErrorSource, SwitchOutcome};
use radius_core::site_table::SiteConfig;
use radius_core::transport::TransportEndpoints;
use radius_storage::SettingsSnapshot;

/// Request body for POST /api/site/enter.
#[derive(Debug, Deserialize)]
pub struct EnterSiteRequest {
    /// Full URL of the page being opened.
    pub url: String,
}

/// Response body for POST /api/site/enter.
#[derive(Debug, Serialize)]
pub struct EnterSiteResponse {
    pub domain: String,
    /// Engine the page should load through.
    pub engine: ProxyEngine,
    pub configuration: ProxyConfiguration,
    pub index: usize,
    pub source: EntrySource,
}

/// Response body for POST /api/site/leave.
#[derive(Debug, Serialize)]
pub struct LeaveSiteResponse {
    /// Whether a session was ended and its configuration restored.
    pub restored: bool,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

/// Request body for POST /api/errors.
#[derive(Debug, Deserialize)]
pub struct ReportErrorRequest {
    /// Error text as seen on the page.
    pub message: String,
    /// Where the error was caught (default: window).
    #[serde(default)]
    pub source: ErrorSource,
}

/// Response body for POST /api/errors.
#[derive(Debug, Serialize)]
pub struct ReportErrorResponse {
    /// Whether the message indicates a configuration failure.
    pub critical: bool,
    /// Pattern that decided the classification.
    pub matched: Option<&'static str>,
    pub classification: Classification,
    /// Whether the error counts toward a switch.
    pub buffered: bool,
}

/// Response body for POST /api/switch.
#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    #[serde(flatten)]
    pub outcome: SwitchOutcome,
    /// Where the page must go next (exhaustion only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Response body for GET /api/navigation.
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub redirect: Option<String>,
}

/// Response body for GET/PUT /api/settings.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: SettingsSnapshot,
    /// Endpoints after applying the settings.
    pub endpoints: TransportEndpoints,
    /// Whether a configuration change was installed (PUT only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
}

/// Request body for PUT /api/settings. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub configuration: Option<ProxyConfiguration>,
    /// Custom wisp server; an empty string restores the default.
    pub wisp_server: Option<String>,
    pub ad_block: Option<bool>,
    pub dynamic_loading: Option<bool>,
}

/// One candidate configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateEntry {
    pub index: usize,
    pub configuration: ProxyConfiguration,
}

/// Response body for GET /api/overrides.
#[derive(Debug, Serialize)]
pub struct OverridesResponse {
    pub count: usize,
    /// Domain to saved candidate.
    pub overrides: BTreeMap<String, CandidateEntry>,
}

/// Response body for DELETE /api/overrides.
#[derive(Debug, Serialize)]
pub struct ClearOverridesResponse {
    pub cleared: usize,
}

/// Query parameters for GET /api/sites/lookup.
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub url: String,
}

/// Response body for GET /api/sites/lookup.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    /// Normalized host, or null for a malformed URL.
    pub domain: Option<String>,
    pub known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteConfig>,
}

/// Response body for GET /api/candidates.
#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub candidates: Vec<CandidateEntry>,
}

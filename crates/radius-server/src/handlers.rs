//! API route handlers.

use axum::extract::{Query, State};
use axum::Json;
use tracing::{debug, info};

use radius_core::configuration::CANDIDATES;
use radius_core::overrides::OverrideStore;
use radius_core::selector::{ErrorReport, SelectorStatus, SwitchOutcome};
use radius_core::site_table::domain_of;

use crate::bridge::InstalledTransport;
use crate::error::{ApiError, Result};
use crate::models::{
    AckResponse, CandidateEntry, CandidatesResponse, ClearOverridesResponse, EnterSiteRequest,
    EnterSiteResponse, LeaveSiteResponse, LookupQuery, LookupResponse, NavigationResponse,
    OverridesResponse, ReportErrorRequest, ReportErrorResponse, SettingsResponse, SwitchResponse,
    UpdateSettingsRequest,
};
use crate::state::AppState;

fn selector_unavailable() -> ApiError {
    ApiError::Unavailable("selector is not running".to_string())
}

// === Session ===

/// POST /api/site/enter - Start a session for a page.
pub async fn enter_site(
    State(state): State<AppState>,
    Json(req): Json<EnterSiteRequest>,
) -> Result<Json<EnterSiteResponse>> {
    if req.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }

    let outcome = state
        .selector
        .enter_site(req.url)
        .await
        .ok_or_else(selector_unavailable)?;

    Ok(Json(EnterSiteResponse {
        domain: outcome.domain,
        engine: outcome.engine,
        configuration: outcome.configuration,
        index: outcome.index,
        source: outcome.source,
    }))
}

/// POST /api/site/leave - End the session and restore the original configuration.
pub async fn leave_site(State(state): State<AppState>) -> Json<LeaveSiteResponse> {
    Json(LeaveSiteResponse {
        restored: state.selector.leave_site().await,
    })
}

/// POST /api/site/abandon - Drop the session without restoring anything.
pub async fn abandon_site(State(state): State<AppState>) -> Json<AckResponse> {
    state.selector.abandon().await;
    Json(AckResponse { success: true })
}

// === Errors and switching ===

/// POST /api/errors - Report an error seen on the page.
pub async fn report_error(
    State(state): State<AppState>,
    Json(req): Json<ReportErrorRequest>,
) -> Result<Json<ReportErrorResponse>> {
    debug!(source = ?req.source, len = req.message.len(), "Error reported");

    let observation = state
        .selector
        .report_error(ErrorReport::new(req.source, req.message))
        .await
        .ok_or_else(selector_unavailable)?;

    Ok(Json(ReportErrorResponse {
        critical: observation.classification.is_critical(),
        matched: observation.classification.pattern(),
        classification: observation.classification,
        buffered: observation.buffered,
    }))
}

/// POST /api/switch - Move to the next configuration now.
pub async fn manual_switch(State(state): State<AppState>) -> Json<SwitchResponse> {
    let outcome = state.selector.manual_switch().await;

    let redirect = match outcome {
        SwitchOutcome::Exhausted => state.navigation.take().map(|n| n.path),
        _ => None,
    };

    Json(SwitchResponse { outcome, redirect })
}

/// GET /api/status - Selector snapshot.
pub async fn get_status(State(state): State<AppState>) -> Result<Json<SelectorStatus>> {
    state
        .selector
        .status()
        .await
        .map(Json)
        .ok_or_else(selector_unavailable)
}

/// GET /api/transport - Transport the page should install.
pub async fn get_transport(State(state): State<AppState>) -> Result<Json<InstalledTransport>> {
    state
        .transport
        .current()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no transport installed".to_string()))
}

/// GET /api/navigation - Pending redirect, delivered once.
pub async fn take_navigation(State(state): State<AppState>) -> Json<NavigationResponse> {
    Json(NavigationResponse {
        redirect: state.navigation.take().map(|n| n.path),
    })
}

// === Settings ===

fn settings_response(state: &AppState, applied: Option<bool>) -> SettingsResponse {
    SettingsResponse {
        settings: state.settings.snapshot(),
        endpoints: state.endpoints(),
        applied,
    }
}

/// GET /api/settings - Current user settings.
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(settings_response(&state, None))
}

/// PUT /api/settings - Update user settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Json<SettingsResponse> {
    let mut endpoints_changed = false;

    if let Some(ref url) = req.wisp_server {
        state.settings.set_wisp_server(Some(url.as_str()));
        endpoints_changed = true;
    }
    if let Some(ad_block) = req.ad_block {
        state.settings.set_ad_block(ad_block);
        endpoints_changed = true;
    }
    if endpoints_changed {
        state.selector.set_endpoints(state.endpoints()).await;
    }

    if let Some(enabled) = req.dynamic_loading {
        state.settings.set_dynamic_loading(enabled);
        state.selector.set_enabled(enabled).await;
    }

    let applied = match req.configuration {
        Some(configuration) => {
            info!("User selected {}", configuration);
            state.settings.set_configuration(configuration);
            Some(
                state
                    .selector
                    .apply_user_configuration(configuration)
                    .await,
            )
        }
        None => None,
    };

    Json(settings_response(&state, applied))
}

// === Overrides ===

/// GET /api/overrides - Saved per-domain candidates.
pub async fn get_overrides(State(state): State<AppState>) -> Json<OverridesResponse> {
    let overrides = state.overrides.load();

    let entries = overrides
        .iter()
        .map(|(domain, index)| {
            (
                domain.to_string(),
                CandidateEntry {
                    index,
                    configuration: CANDIDATES[index],
                },
            )
        })
        .collect();

    Json(OverridesResponse {
        count: overrides.len(),
        overrides: entries,
    })
}

/// DELETE /api/overrides - Forget every saved candidate.
pub async fn clear_overrides(State(state): State<AppState>) -> Json<ClearOverridesResponse> {
    let cleared = state.selector.override_count().await;
    state.selector.clear_overrides().await;
    Json(ClearOverridesResponse { cleared })
}

// === Sites ===

/// GET /api/sites/lookup - Static table lookup for a URL.
pub async fn lookup_site(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Json<LookupResponse> {
    let site = state
        .sites
        .lookup_entry(&query.url)
        .map(|m| m.site.clone());

    Json(LookupResponse {
        domain: domain_of(&query.url),
        known: site.is_some(),
        site,
    })
}

/// GET /api/candidates - The fallback order.
pub async fn get_candidates(State(state): State<AppState>) -> Json<CandidatesResponse> {
    let candidates = state
        .sites
        .fallback_sequence()
        .iter()
        .enumerate()
        .map(|(index, configuration)| CandidateEntry {
            index,
            configuration: *configuration,
        })
        .collect();

    Json(CandidatesResponse { candidates })
}

//! Site Configuration Table.
//!
//! Static knowledge of domains that are known to need a specific proxy
//! configuration, plus the full fallback search order.
//!
//! Matching rules:
//! - The URL host is lowercased and a leading `www.` is stripped
//! - A host matches a domain when it equals it or ends with `.{domain}`
//! - Entries are checked in table order; the first match wins

use serde::{Deserialize, Serialize};
use url::Url;

use crate::configuration::{
    ConfigurationCandidateList, ProxyConfiguration, ProxyEngine, RoutingMode, Transport,
    CANDIDATES,
};

// =============================================================================
// Domain helpers
// =============================================================================

/// Lowercases a host and strips one leading `www.`.
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Extracts the normalized domain from a URL.
///
/// Returns `None` for strings that do not parse as an absolute URL or that
/// have no host (e.g. `about:blank`).
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(normalize_domain(host))
}

// =============================================================================
// Site entries
// =============================================================================

/// A site with a preferred proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Short identifier.
    pub name: String,
    /// Registered domains (normalized on construction).
    pub domains: Vec<String>,
    /// Preferred configuration for these domains.
    pub configuration: ProxyConfiguration,
    /// Why the site needs this configuration.
    pub description: String,
}

impl SiteConfig {
    /// Creates a site entry; domains are normalized and deduplicated.
    pub fn new(
        name: impl Into<String>,
        domains: &[&str],
        configuration: ProxyConfiguration,
        description: impl Into<String>,
    ) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(domains.len());
        for domain in domains {
            let d = normalize_domain(domain);
            if !d.is_empty() && !normalized.contains(&d) {
                normalized.push(d);
            }
        }

        Self {
            name: name.into(),
            domains: normalized,
            configuration,
            description: description.into(),
        }
    }

    /// Checks whether a normalized host belongs to this site.
    pub fn matches(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{}", d)))
    }
}

const SCRAMJET_EPOXY_WISP: ProxyConfiguration =
    ProxyConfiguration::new(ProxyEngine::Scramjet, Transport::Epoxy, RoutingMode::Wisp);

const ULTRAVIOLET_LIBCURL_WISP: ProxyConfiguration =
    ProxyConfiguration::new(ProxyEngine::Ultraviolet, Transport::Libcurl, RoutingMode::Wisp);

/// Returns the bundled site entries.
pub fn bundled_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig::new(
            "nowgg",
            &["now.gg", "www.now.gg"],
            SCRAMJET_EPOXY_WISP,
            "Cloud gaming platform - requires Scramjet with Epoxy",
        ),
        SiteConfig::new(
            "easyfungg",
            &["easyfun.gg", "www.easyfun.gg"],
            SCRAMJET_EPOXY_WISP,
            "Gaming platform - Scramjet with Epoxy",
        ),
        SiteConfig::new(
            "discord",
            &["discord.com", "www.discord.com", "discordapp.com"],
            SCRAMJET_EPOXY_WISP,
            "Discord - Scramjet for WebSocket support",
        ),
        SiteConfig::new(
            "youtube",
            &["youtube.com", "www.youtube.com", "m.youtube.com"],
            ULTRAVIOLET_LIBCURL_WISP,
            "YouTube - Ultraviolet with Libcurl",
        ),
        SiteConfig::new(
            "spotify",
            &["spotify.com", "www.spotify.com", "open.spotify.com"],
            SCRAMJET_EPOXY_WISP,
            "Spotify - Scramjet for audio streaming",
        ),
        SiteConfig::new(
            "twitch",
            &["twitch.tv", "www.twitch.tv"],
            SCRAMJET_EPOXY_WISP,
            "Twitch - Scramjet for live streaming",
        ),
        SiteConfig::new(
            "roblox",
            &["roblox.com", "www.roblox.com"],
            SCRAMJET_EPOXY_WISP,
            "Roblox - Scramjet for the game client",
        ),
        SiteConfig::new(
            "cloudgaming",
            &["geforce.com", "www.geforce.com", "stadia.google.com"],
            SCRAMJET_EPOXY_WISP,
            "Cloud gaming - Scramjet with Epoxy",
        ),
    ]
}

// =============================================================================
// Table
// =============================================================================

/// Result of a table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMatch<'a> {
    /// The normalized host that was looked up.
    pub domain: String,
    /// The matching entry.
    pub site: &'a SiteConfig,
}

/// Static mapping from domain to preferred configuration.
#[derive(Debug, Clone)]
pub struct SiteConfigTable {
    sites: Vec<SiteConfig>,
}

impl Default for SiteConfigTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SiteConfigTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Creates a table with the bundled entries.
    pub fn with_defaults() -> Self {
        Self {
            sites: bundled_sites(),
        }
    }

    /// Creates a table from explicit entries.
    pub fn with_sites(sites: Vec<SiteConfig>) -> Self {
        Self { sites }
    }

    /// Appends an entry. Earlier entries still take precedence.
    pub fn add(&mut self, site: SiteConfig) {
        self.sites.push(site);
    }

    /// Returns all entries in match order.
    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    /// Looks up the entry for a URL.
    pub fn lookup_entry(&self, url: &str) -> Option<SiteMatch<'_>> {
        let domain = domain_of(url)?;
        self.lookup_domain(&domain)
            .map(|site| SiteMatch { domain, site })
    }

    /// Looks up the entry for an already-normalized domain.
    pub fn lookup_domain(&self, domain: &str) -> Option<&SiteConfig> {
        let domain = normalize_domain(domain);
        self.sites.iter().find(|site| site.matches(&domain))
    }

    /// Returns the preferred configuration for a URL, if the site is known.
    ///
    /// Malformed URLs yield `None`.
    pub fn lookup(&self, url: &str) -> Option<ProxyConfiguration> {
        self.lookup_entry(url).map(|m| m.site.configuration)
    }

    /// Checks whether a URL belongs to a known difficult site.
    pub fn is_known_site(&self, url: &str) -> bool {
        self.lookup_entry(url).is_some()
    }

    /// Returns the fixed fallback search order.
    pub fn fallback_sequence(&self) -> &'static ConfigurationCandidateList {
        &CANDIDATES
    }
}

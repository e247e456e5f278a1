//! Error classification for page-load failures.
//!
//! Decides whether a free-text error message points at a configuration-level
//! failure (worth switching proxy settings) or at benign noise such as ads,
//! analytics or missing images. Ignore patterns take precedence over critical
//! patterns, and anything matching neither is treated as non-critical.

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;

/// Messages matching any of these are never critical.
const IGNORED_PATTERNS: &[&str] = &[
    // 404s on resources
    r"404\s+not\s+found",
    r"failed\s+to\s+load\s+resource.*404",
    // Analytics / tracking
    r"analytics",
    r"tracking",
    r"beacon",
    r"telemetry",
    // Ads
    r"ads\.",
    r"adservice",
    r"doubleclick",
    r"googlesyndication",
    // Fonts
    r"font.*failed",
    r"woff2?.*failed",
    // Images
    r"failed\s+to\s+load\s+resource.*image",
    r"failed\s+to\s+load\s+resource.*png",
    r"failed\s+to\s+load\s+resource.*jpg",
    r"failed\s+to\s+load\s+resource.*gif",
    r"failed\s+to\s+load\s+resource.*svg",
    r"favicon",
    // CORS on non-essential resources
    r"cors.*font",
    r"cors.*image",
];

/// Messages matching any of these indicate the page could not render.
const CRITICAL_PATTERNS: &[&str] = &[
    // JSON parsing
    r"unexpected\s+token.*json",
    r"json\s+parse\s+error",
    r"invalid\s+json",
    r"unexpected\s+end\s+of\s+json\s+input",
    r"syntaxerror.*json",
    // Network / fetch
    r"failed\s+to\s+fetch",
    r"networkerror",
    r"load\s+failed",
    r"net::err_",
    r"connection\s+refused",
    r"connection\s+reset",
    r"connection\s+timed\s+out",
    // Proxy / transport layer
    r"bare\s+server\s+error",
    r"wisp\s+connection\s+failed",
    r"proxy\s+connection\s+failed",
    r"transport\s+error",
    r"service\s+worker\s+error",
    // Script loading
    r"script\s+error",
    r"failed\s+to\s+load\s+script",
    r"failed\s+to\s+load\s+resource.*script",
];

/// Compiled pattern group.
struct PatternGroup {
    set: RegexSet,
    patterns: &'static [&'static str],
}

impl PatternGroup {
    fn compile(patterns: &'static [&'static str]) -> Self {
        // Patterns are compile-time constants covered by tests.
        let set = RegexSet::new(patterns).expect("Invalid regex patterns");
        Self { set, patterns }
    }

    /// Returns the first matching pattern source.
    fn first_match(&self, text: &str) -> Option<&'static str> {
        self.set
            .matches(text)
            .iter()
            .next()
            .map(|idx| self.patterns[idx])
    }
}

static IGNORED: Lazy<PatternGroup> = Lazy::new(|| PatternGroup::compile(IGNORED_PATTERNS));
static CRITICAL: Lazy<PatternGroup> = Lazy::new(|| PatternGroup::compile(CRITICAL_PATTERNS));

/// Outcome of classifying a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum Classification {
    /// Matched an ignore pattern.
    Ignored(&'static str),
    /// Matched a critical pattern.
    Critical(&'static str),
    /// Matched nothing; treated as non-critical.
    Unclassified,
}

impl Classification {
    /// Returns true for critical messages.
    pub fn is_critical(&self) -> bool {
        matches!(self, Classification::Critical(_))
    }

    /// Returns the matched pattern, if any.
    pub fn pattern(&self) -> Option<&'static str> {
        match self {
            Classification::Ignored(p) | Classification::Critical(p) => Some(*p),
            Classification::Unclassified => None,
        }
    }
}

/// Pure, pattern-based error classifier.
///
/// Patterns are compiled once per process and shared by every instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Creates a classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classifies a message.
    pub fn classify(&self, message: &str) -> Classification {
        let text = message.to_lowercase();

        if let Some(pattern) = IGNORED.first_match(&text) {
            return Classification::Ignored(pattern);
        }
        if let Some(pattern) = CRITICAL.first_match(&text) {
            return Classification::Critical(pattern);
        }
        Classification::Unclassified
    }

    /// Returns true when the message indicates a configuration-level failure.
    pub fn is_critical(&self, message: &str) -> bool {
        self.classify(message).is_critical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new()
    }

    #[test]
    fn patterns_compile() {
        assert!(CRITICAL_PATTERNS.iter().all(|p| Regex::new(p).is_ok()));
        assert!(IGNORED_PATTERNS.iter().all(|p| Regex::new(p).is_ok()));
    }

    // === Critical ===

    #[test]
    fn detects_network_failures() {
        let c = classifier();
        assert!(c.is_critical("TypeError: Failed to fetch"));
        assert!(c.is_critical("NetworkError: x"));
        assert!(c.is_critical("GET https://a.com net::ERR_CONNECTION_RESET"));
        assert!(c.is_critical("connection timed out"));
        assert!(c.is_critical("Load failed"));
    }

    #[test]
    fn detects_json_failures() {
        let c = classifier();
        assert!(c.is_critical("SyntaxError: Unexpected token < in JSON at position 0"));
        assert!(c.is_critical("Unexpected end of JSON input"));
        assert!(c.is_critical("invalid json response"));
    }

    #[test]
    fn detects_transport_failures() {
        let c = classifier();
        assert!(c.is_critical("Bare server error: 502"));
        assert!(c.is_critical("wisp connection failed"));
        assert!(c.is_critical("Transport error while connecting"));
        assert!(c.is_critical("Service Worker error"));
    }

    #[test]
    fn detects_script_failures() {
        let c = classifier();
        assert!(c.is_critical("Script error."));
        assert!(c.is_critical("Failed to load script /app.js"));
        assert!(c.is_critical("Failed to load resource: main.js script blocked"));
    }

    // === Ignored ===

    #[test]
    fn ignores_benign_failures() {
        let c = classifier();
        assert!(!c.is_critical("404 Not Found"));
        assert!(!c.is_critical("Failed to load resource: favicon.ico"));
        assert!(!c.is_critical("Font loading failed"));
        assert!(!c.is_critical("Failed to load resource: the server responded with a status of 404"));
    }

    #[test]
    fn ignore_takes_precedence() {
        let c = classifier();
        // Both lists match; the ignore list wins.
        assert!(!c.is_critical("Failed to fetch https://www.google-analytics.com/collect"));
        assert!(!c.is_critical("net::ERR_BLOCKED_BY_CLIENT pagead2.googlesyndication.com"));
        assert!(!c.is_critical("TypeError: Failed to fetch (tracking pixel)"));
        assert!(!c.is_critical("NetworkError at https://ads.example.com"));

        assert!(matches!(
            c.classify("Failed to fetch beacon"),
            Classification::Ignored("beacon")
        ));
    }

    #[test]
    fn unmatched_is_not_critical() {
        let c = classifier();
        assert_eq!(c.classify("Uncaught ReferenceError: foo is not defined"), Classification::Unclassified);
        assert_eq!(c.classify(""), Classification::Unclassified);
        assert!(!c.is_critical("everything is fine"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(classifier().is_critical("FAILED TO FETCH"));
        assert!(!classifier().is_critical("FAILED TO FETCH FAVICON"));
    }

    #[test]
    fn classification_reports_pattern() {
        let result = classifier().classify("failed to fetch");
        assert!(result.is_critical());
        assert_eq!(result.pattern(), Some(r"failed\s+to\s+fetch"));
        assert_eq!(Classification::Unclassified.pattern(), None);
    }
}

//! Per-page selector session.
//!
//! Pure bookkeeping: which site is active, the configuration to restore on
//! leave, the candidate index reached so far and the buffered critical
//! errors. Nothing here performs I/O.

use serde::Serialize;

use crate::configuration::ProxyConfiguration;

/// Lifecycle state of the selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorState {
    /// No current site.
    #[default]
    Idle,
    /// Site entered, observing errors.
    Active,
    /// Applying a new candidate.
    Switching,
    /// Every candidate was tried.
    Exhausted,
}

impl SelectorState {
    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorState::Idle => "idle",
            SelectorState::Active => "active",
            SelectorState::Switching => "switching",
            SelectorState::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for SelectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of advancing the candidate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Try the candidate at this index.
    Candidate(usize),
    /// The index moved past the end of the list.
    Exhausted,
}

/// Transient state for one page lifetime.
#[derive(Debug, Clone, Default)]
pub struct SelectorSession {
    current_site: Option<String>,
    error_buffer: Vec<String>,
    config_index: usize,
    original: Option<ProxyConfiguration>,
    preferred: Option<ProxyConfiguration>,
}

impl SelectorSession {
    /// Creates an idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a site is entered.
    pub fn is_active(&self) -> bool {
        self.current_site.is_some()
    }

    /// The normalized domain of the current site.
    pub fn current_site(&self) -> Option<&str> {
        self.current_site.as_deref()
    }

    /// Candidate index reached so far.
    pub fn config_index(&self) -> usize {
        self.config_index
    }

    /// Configuration active before the session started.
    pub fn original(&self) -> Option<ProxyConfiguration> {
        self.original
    }

    /// Site-specific configuration installed on entry, if any.
    pub fn preferred(&self) -> Option<ProxyConfiguration> {
        self.preferred
    }

    /// Records the configuration installed on entry so the candidate walk
    /// does not repeat it.
    pub fn prefer(&mut self, configuration: ProxyConfiguration) {
        self.preferred = Some(configuration);
    }

    /// Critical errors collected since the last buffer flush.
    pub fn buffered_errors(&self) -> &[String] {
        &self.error_buffer
    }

    /// Starts a session on `domain`.
    ///
    /// `active` is saved as the configuration to restore, but only when no
    /// session is running; a repeated begin keeps the first saved value.
    /// Returns true when this call saved the original configuration.
    pub fn begin(&mut self, domain: String, active: ProxyConfiguration, index: usize) -> bool {
        let fresh = self.original.is_none();
        if fresh {
            self.original = Some(active);
        }
        self.current_site = Some(domain);
        self.config_index = index;
        self.preferred = None;
        self.error_buffer.clear();
        fresh
    }

    /// Buffers a critical error message.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.error_buffer.push(message.into());
    }

    /// Drains the error buffer.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.error_buffer)
    }

    /// Moves to the next candidate in a list of `len` entries.
    ///
    /// The index saturates at `len`, which marks the list as exhausted.
    pub fn advance(&mut self, len: usize) -> Advance {
        self.config_index = (self.config_index + 1).min(len);
        if self.config_index >= len {
            Advance::Exhausted
        } else {
            Advance::Candidate(self.config_index)
        }
    }

    /// Clears all session state, returning the saved original configuration.
    pub fn reset(&mut self) -> Option<ProxyConfiguration> {
        self.current_site = None;
        self.error_buffer.clear();
        self.config_index = 0;
        self.preferred = None;
        self.original.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::CANDIDATES;

    #[test]
    fn new_session_is_idle() {
        let s = SelectorSession::new();
        assert!(!s.is_active());
        assert_eq!(s.config_index(), 0);
        assert!(s.original().is_none());
    }

    #[test]
    fn begin_saves_original_once() {
        let mut s = SelectorSession::new();
        assert!(s.begin("a.com".into(), CANDIDATES[2], 0));
        assert!(!s.begin("a.com".into(), CANDIDATES[4], 0));
        assert_eq!(s.original(), Some(CANDIDATES[2]));
        assert_eq!(s.current_site(), Some("a.com"));
    }

    #[test]
    fn original_present_while_active() {
        let mut s = SelectorSession::new();
        s.begin("a.com".into(), CANDIDATES[0], 3);
        assert!(s.is_active() && s.original().is_some());
        s.reset();
        assert!(!s.is_active() && s.original().is_none());
    }

    #[test]
    fn advance_walks_then_exhausts() {
        let mut s = SelectorSession::new();
        s.begin("a.com".into(), CANDIDATES[0], 0);
        for expected in 1..CANDIDATES.len() {
            assert_eq!(s.advance(CANDIDATES.len()), Advance::Candidate(expected));
        }
        assert_eq!(s.advance(CANDIDATES.len()), Advance::Exhausted);
        assert_eq!(s.config_index(), CANDIDATES.len());
        // Saturates.
        assert_eq!(s.advance(CANDIDATES.len()), Advance::Exhausted);
        assert_eq!(s.config_index(), CANDIDATES.len());
    }

    #[test]
    fn errors_buffer_and_drain() {
        let mut s = SelectorSession::new();
        s.begin("a.com".into(), CANDIDATES[0], 0);
        s.push_error("one");
        s.push_error(String::from("two"));
        assert_eq!(s.buffered_errors().len(), 2);
        assert_eq!(s.take_errors(), vec!["one".to_string(), "two".to_string()]);
        assert!(s.buffered_errors().is_empty());
    }

    #[test]
    fn reset_returns_original() {
        let mut s = SelectorSession::new();
        s.begin("a.com".into(), CANDIDATES[5], 2);
        s.push_error("x");
        assert_eq!(s.reset(), Some(CANDIDATES[5]));
        assert_eq!(s.config_index(), 0);
        assert!(s.buffered_errors().is_empty());
        assert_eq!(s.reset(), None);
    }

    #[test]
    fn preferred_is_per_session() {
        let mut s = SelectorSession::new();
        s.begin("a.com".into(), CANDIDATES[0], 0);
        s.prefer(CANDIDATES[3]);
        assert_eq!(s.preferred(), Some(CANDIDATES[3]));
        s.reset();
        assert!(s.preferred().is_none());

        s.begin("b.com".into(), CANDIDATES[0], 0);
        assert!(s.preferred().is_none());
    }

    #[test]
    fn state_names() {
        assert_eq!(SelectorState::Idle.as_str(), "idle");
        assert_eq!(SelectorState::Exhausted.to_string(), "exhausted");
    }
}

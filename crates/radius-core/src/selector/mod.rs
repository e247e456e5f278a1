//! Dynamic configuration selection.
//!
//! - [`session`]: per-page bookkeeping
//! - [`engine`]: the selection state machine
//! - [`service`]: the task that serializes every transition

pub mod engine;
pub mod service;
pub mod session;

pub use engine::{
    ConfigurationSelector, EnterOutcome, EntrySource, ErrorObservation, ErrorReport, ErrorSource,
    SelectorConfig, SelectorStatus, SwitchOutcome, SwitchReason, SwitchRecord,
    DEFAULT_DEBOUNCE, DEFAULT_ERROR_THRESHOLD, DEFAULT_FAILURE_PATH, DEFAULT_HISTORY_LIMIT,
};
pub use service::{SelectorHandle, SelectorService};
pub use session::{SelectorSession, SelectorState};

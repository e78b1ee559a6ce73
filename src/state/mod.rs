//! Shared assistant runtime state
//!
//! One `AssistantState` value is owned by the Dispatcher behind a
//! single-writer lock; it is never shared across resolutions except through
//! that lock. Callers receive clones as snapshots.

use crate::core::types::DispatchSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oldest history entries are evicted past this point
pub const HISTORY_CAP: usize = 100;

/// A hint surfaced by an automation rule's `show_hint` action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub rule: String,
    pub text: String,
}

/// One recorded command resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    pub ok: bool,
    pub message: String,
    pub source: DispatchSource,
    pub at: DateTime<Utc>,
}

/// Mutable runtime state threaded through dispatches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantState {
    /// Current assistant mode (set by automation rules or `/mode`)
    pub mode: String,
    pub suggestions: Vec<Suggestion>,
    pub history: Vec<HistoryEntry>,
}

impl Default for AssistantState {
    fn default() -> Self {
        Self {
            mode: "normal".to_string(),
            suggestions: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl AssistantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a history entry, evicting the oldest past the cap
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(command: &str) -> HistoryEntry {
        HistoryEntry {
            command: command.to_string(),
            ok: true,
            message: "ok".to_string(),
            source: DispatchSource::User,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_history_capped() {
        let mut state = AssistantState::new();
        for i in 0..(HISTORY_CAP + 10) {
            state.record(entry(&format!("cmd {i}")));
        }
        assert_eq!(state.history.len(), HISTORY_CAP);
        // oldest entries were evicted
        assert_eq!(state.history[0].command, "cmd 10");
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(AssistantState::new().mode, "normal");
    }
}

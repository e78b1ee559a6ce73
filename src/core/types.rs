//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for stored records (custom commands, reminders)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Risk tier of an action. The ordering is the permission lattice:
/// `Safe < Confirm < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Safe,
    Confirm,
    Admin,
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Confirm => write!(f, "confirm"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// The uniform contract every execution path returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Soft block: the caller must resubmit with bypass to proceed
    #[serde(
        rename = "needsConfirmation",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub needs_confirmation: bool,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: None,
            needs_confirmation: false,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: Some(data),
            needs_confirmation: false,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
            needs_confirmation: false,
        }
    }

    pub fn confirmation_required(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
            needs_confirmation: true,
        }
    }
}

/// Where a dispatch originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchSource {
    /// Top-level command from the user
    User,
    /// Delegated target of a custom command
    Custom,
    /// Follow-up produced by an automation rule
    Automation,
    /// Step of a routine
    Routine,
}

/// Ephemeral per-resolution context threaded through recursive dispatches.
/// Created for a top-level invocation, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext {
    pub depth: u32,
    pub write_history: bool,
    pub source: DispatchSource,
}

impl DispatchContext {
    pub fn top_level() -> Self {
        Self {
            depth: 0,
            write_history: true,
            source: DispatchSource::User,
        }
    }

    /// Context for a sub-dispatch one level deeper. Sub-dispatches never
    /// write their own history entries.
    pub fn descend(&self, source: DispatchSource) -> Self {
        Self {
            depth: self.depth + 1,
            write_history: false,
            source,
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase + whitespace-collapsed form used for command matching
pub fn normalize_command(text: &str) -> String {
    normalize_whitespace(&text.to_lowercase())
}

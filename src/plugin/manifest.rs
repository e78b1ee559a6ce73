//! Plugin manifests and their validation
//!
//! Trust is manifest-declared only: a manifest must parse and validate
//! before its plugin participates in routing, and the declared permission
//! level is what the dispatcher gates on.

use crate::core::error::{AssistantError, Result};
use crate::core::types::PermissionLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name looked for in each plugin subfolder
pub const MANIFEST_FILE: &str = "plugin.json";

/// Entry file used when the manifest declares none
pub const DEFAULT_ENTRY: &str = "index.js";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Command prefix that routes to this plugin
    pub entry_command: String,
    /// Entry file relative to the plugin directory
    #[serde(default)]
    pub entry: Option<String>,
    pub permission_level: PermissionLevel,
}

impl PluginManifest {
    /// Parse and validate manifest JSON
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content)
            .map_err(|e| AssistantError::Plugin(format!("Invalid manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn entry_file(&self) -> &str {
        self.entry.as_deref().unwrap_or(DEFAULT_ENTRY)
    }

    /// Schema checks applied before a manifest is trusted
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AssistantError::Plugin(format!(
                "Manifest id '{}' must be non-empty alphanumeric/dash/underscore",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(AssistantError::Plugin("Manifest name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(AssistantError::Plugin("Manifest version must not be empty".into()));
        }
        if self.entry_command.trim().is_empty() {
            return Err(AssistantError::Plugin(
                "Manifest entryCommand must not be empty".into(),
            ));
        }
        let entry = self.entry_file();
        if std::path::Path::new(entry).is_absolute() {
            return Err(AssistantError::Plugin(format!(
                "Manifest entry '{}' must be a relative path",
                entry
            )));
        }
        Ok(())
    }
}

/// A discovered plugin: manifest plus install-side state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginState {
    pub manifest: PluginManifest,
    pub enabled: bool,
    pub installed_at: DateTime<Utc>,
    /// Plugin's own directory; entry resolution is confined to it
    pub dir: PathBuf,
}

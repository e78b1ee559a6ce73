//! Runtime configuration loaded from TOML
//!
//! All tunable limits are collected here with their defaults. The config file
//! is optional; a missing file yields `AssistantConfig::default()`.

use crate::core::error::{AssistantError, Result};
use crate::core::types::PermissionLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard ceiling on chained re-dispatch (custom delegation, automation
/// follow-ups, routine steps). Exceeding it is a terminal failure.
pub const MAX_DISPATCH_DEPTH: u32 = 4;

/// Commands longer than this are rejected before any matching
pub const MAX_COMMAND_LEN: usize = 512;

/// Resource bounds for sandboxed plugin execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Wall-clock budget per invocation in milliseconds. The VM is
    /// interrupted once the deadline passes.
    pub timeout_ms: u64,
    /// Heap ceiling for the plugin VM in bytes
    pub memory_limit_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 4_000,
            memory_limit_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Endpoint configuration for the `/ask` passthrough
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

/// Assistant runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Directory for persisted stores (custom commands, reminders)
    pub data_dir: PathBuf,
    /// Directory scanned for plugin subfolders
    pub plugin_dir: PathBuf,
    /// TOML file holding automation rules and routines
    pub rules_path: Option<PathBuf>,
    /// Runtime permission ceiling; actions above it are denied outright
    pub permission_ceiling: PermissionLevel,
    pub sandbox: SandboxLimits,
    /// Friendly name -> executable for the open-app intent
    pub app_aliases: HashMap<String, String>,
    pub llm: Option<LlmConfig>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            plugin_dir: PathBuf::from("plugins"),
            rules_path: None,
            permission_ceiling: PermissionLevel::Admin,
            sandbox: SandboxLimits::default(),
            app_aliases: HashMap::new(),
            llm: None,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AssistantError::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.sandbox.timeout_ms == 0 {
            return Err(AssistantError::Config(
                "sandbox.timeout_ms must be positive".into(),
            ));
        }
        // Below ~1 MiB QuickJS cannot even bootstrap a context
        if self.sandbox.memory_limit_bytes < 1024 * 1024 {
            return Err(AssistantError::Config(format!(
                "sandbox.memory_limit_bytes ({}) must be at least 1 MiB",
                self.sandbox.memory_limit_bytes
            )));
        }
        if let Some(llm) = &self.llm {
            if llm.api_url.is_empty() {
                return Err(AssistantError::Config("llm.api_url must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.timeout_ms, 4_000);
        assert_eq!(config.permission_ceiling, PermissionLevel::Admin);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
permission_ceiling = "confirm"

[sandbox]
timeout_ms = 1500

[app_aliases]
browser = "firefox"
"#;
        let config: AssistantConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.permission_ceiling, PermissionLevel::Confirm);
        assert_eq!(config.sandbox.timeout_ms, 1500);
        // unspecified fields keep their defaults
        assert_eq!(config.sandbox.memory_limit_bytes, 32 * 1024 * 1024);
        assert_eq!(config.app_aliases["browser"], "firefox");
    }

    #[test]
    fn test_validate_rejects_tiny_memory_limit() {
        let config = AssistantConfig {
            sandbox: SandboxLimits {
                timeout_ms: 4_000,
                memory_limit_bytes: 1024,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Load automation rules and routines from a TOML file

use crate::automation::engine::AutomationRule;
use crate::core::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named command sequence runnable via the run-routine intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    pub rules: Vec<AutomationRule>,
    pub routines: Vec<Routine>,
}

/// Parse a rules file, validating each entry
pub fn parse_rules(content: &str) -> Result<RulesFile> {
    let file: RulesFile = toml::from_str(content)
        .map_err(|e| AssistantError::Config(format!("Invalid rules TOML: {}", e)))?;

    for rule in &file.rules {
        if rule.name.is_empty() {
            return Err(AssistantError::Config("rule with empty name".into()));
        }
        if rule.actions.is_empty() {
            return Err(AssistantError::Config(format!(
                "rule '{}' has no actions",
                rule.name
            )));
        }
    }
    for routine in &file.routines {
        if routine.name.is_empty() {
            return Err(AssistantError::Config("routine with empty name".into()));
        }
        if routine.steps.is_empty() {
            return Err(AssistantError::Config(format!(
                "routine '{}' has no steps",
                routine.name
            )));
        }
    }
    Ok(file)
}

/// Load rules and routines from disk; a missing file yields empty sets
pub fn load_rules(path: &Path) -> Result<RulesFile> {
    if !path.exists() {
        return Ok(RulesFile::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| AssistantError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_rules(&content)
}

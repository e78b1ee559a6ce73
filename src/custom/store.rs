//! User-defined command aliases
//!
//! A custom command maps a trigger phrase to a target action, optionally
//! templating arguments. The store is backed by a JSON file; every mutation
//! persists immediately (tmp-file + rename). An in-memory mode backs tests.

use crate::core::error::{AssistantError, Result};
use crate::core::types::{normalize_command, normalize_whitespace, RecordId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A stored alias. `(name, trigger)` are case-insensitively unique across
/// enabled and disabled entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCommand {
    pub id: RecordId,
    pub name: String,
    pub trigger: String,
    pub action: String,
    pub pass_through_args: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct CustomCommandUpdate {
    pub name: Option<String>,
    pub trigger: Option<String>,
    pub action: Option<String>,
    pub pass_through_args: Option<bool>,
    pub enabled: Option<bool>,
}

/// A successful trigger match with the remaining argument text
#[derive(Debug, Clone)]
pub struct CustomMatch {
    pub command: CustomCommand,
    pub args: String,
}

pub struct CustomCommandStore {
    path: Option<PathBuf>,
    commands: RwLock<Vec<CustomCommand>>,
}

impl CustomCommandStore {
    /// Volatile store for tests and ephemeral sessions
    pub fn in_memory() -> Self {
        Self {
            path: None,
            commands: RwLock::new(Vec::new()),
        }
    }

    /// Open a file-backed store, creating parent directories as needed.
    /// A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let commands = Self::read_file(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            commands: RwLock::new(commands),
        })
    }

    fn read_file(path: &Path) -> Result<Vec<CustomCommand>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            AssistantError::Store(format!("Corrupt command store {}: {}", path.display(), e))
        })
    }

    /// Re-read the backing file, replacing in-memory contents
    pub fn reload(&self) -> Result<()> {
        if let Some(path) = &self.path {
            let fresh = Self::read_file(path)?;
            *self.commands.write() = fresh;
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<CustomCommand> {
        self.commands.read().clone()
    }

    pub fn get(&self, id: RecordId) -> Option<CustomCommand> {
        self.commands.read().iter().find(|c| c.id == id).cloned()
    }

    pub fn create(
        &self,
        name: &str,
        trigger: &str,
        action: &str,
        pass_through_args: bool,
    ) -> Result<CustomCommand> {
        let name = normalize_whitespace(name);
        let trigger = normalize_command(trigger);
        let action = normalize_whitespace(action);
        if name.is_empty() || trigger.is_empty() || action.is_empty() {
            return Err(AssistantError::InvalidInput(
                "name, trigger and action must not be empty".into(),
            ));
        }

        let mut commands = self.commands.write();
        if let Some(existing) = find_collision(&commands, &name, &trigger, None) {
            return Err(AssistantError::CommandConflict(format!(
                "'{}' collides with existing command '{}'",
                trigger, existing.name
            )));
        }

        let now = Utc::now();
        let command = CustomCommand {
            id: RecordId::new(),
            name,
            trigger,
            action,
            pass_through_args,
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        commands.push(command.clone());
        self.persist(&commands)?;
        Ok(command)
    }

    pub fn update(&self, id: RecordId, update: CustomCommandUpdate) -> Result<CustomCommand> {
        let mut commands = self.commands.write();
        let idx = commands
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| AssistantError::CommandNotFound(id.to_string()))?;

        let name = update
            .name
            .map(|n| normalize_whitespace(&n))
            .unwrap_or_else(|| commands[idx].name.clone());
        let trigger = update
            .trigger
            .map(|t| normalize_command(&t))
            .unwrap_or_else(|| commands[idx].trigger.clone());
        if name.is_empty() || trigger.is_empty() {
            return Err(AssistantError::InvalidInput(
                "name and trigger must not be empty".into(),
            ));
        }
        if let Some(existing) = find_collision(&commands, &name, &trigger, Some(id)) {
            return Err(AssistantError::CommandConflict(format!(
                "'{}' collides with existing command '{}'",
                trigger, existing.name
            )));
        }

        let entry = &mut commands[idx];
        entry.name = name;
        entry.trigger = trigger;
        if let Some(action) = update.action {
            entry.action = normalize_whitespace(&action);
        }
        if let Some(pass) = update.pass_through_args {
            entry.pass_through_args = pass;
        }
        if let Some(enabled) = update.enabled {
            entry.enabled = enabled;
        }
        entry.updated_at = Utc::now();
        let updated = entry.clone();
        self.persist(&commands)?;
        Ok(updated)
    }

    pub fn delete(&self, id: RecordId) -> Result<()> {
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|c| c.id != id);
        if commands.len() == before {
            return Err(AssistantError::CommandNotFound(id.to_string()));
        }
        self.persist(&commands)
    }

    pub fn set_enabled(&self, id: RecordId, enabled: bool) -> Result<CustomCommand> {
        self.update(
            id,
            CustomCommandUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
    }

    /// Match a raw command against enabled triggers, longest trigger first
    /// so a more specific alias wins over a shorter overlapping one.
    pub fn match_command(&self, raw: &str) -> Option<CustomMatch> {
        let normalized = normalize_command(raw);
        let commands = self.commands.read();
        let mut enabled: Vec<&CustomCommand> = commands.iter().filter(|c| c.enabled).collect();
        enabled.sort_by(|a, b| b.trigger.len().cmp(&a.trigger.len()));

        for command in enabled {
            if normalized == command.trigger || normalized == normalize_command(&command.name) {
                return Some(CustomMatch {
                    command: command.clone(),
                    args: String::new(),
                });
            }
            if let Some(rest) = normalized.strip_prefix(&format!("{} ", command.trigger)) {
                return Some(CustomMatch {
                    command: command.clone(),
                    args: rest.trim().to_string(),
                });
            }
        }
        None
    }

    /// Expand a matched command into its target action text
    pub fn build_target(command: &CustomCommand, args: &str) -> String {
        if command.action.contains("{args}") {
            return command.action.replace("{args}", args);
        }
        if command.pass_through_args && !args.is_empty() {
            return format!("{} {}", command.action, args);
        }
        command.action.clone()
    }

    fn persist(&self, commands: &[CustomCommand]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(commands)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn find_collision<'a>(
    commands: &'a [CustomCommand],
    name: &str,
    trigger: &str,
    exclude: Option<RecordId>,
) -> Option<&'a CustomCommand> {
    let name_lower = name.to_lowercase();
    commands.iter().find(|c| {
        exclude != Some(c.id)
            && (c.name.to_lowercase() == name_lower || c.trigger == trigger)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(entries: &[(&str, &str, &str, bool)]) -> CustomCommandStore {
        let store = CustomCommandStore::in_memory();
        for (name, trigger, action, pass) in entries {
            store.create(name, trigger, action, *pass).unwrap();
        }
        store
    }

    #[test]
    fn test_create_normalizes_trigger() {
        let store = CustomCommandStore::in_memory();
        let cmd = store.create("Sprint", "  Start   SPRINT ", "open timer", false).unwrap();
        assert_eq!(cmd.trigger, "start sprint");
        assert_eq!(cmd.name, "Sprint");
    }

    #[test]
    fn test_create_rejects_trigger_collision() {
        let store = store_with(&[("Focus", "focus", "open editor", false)]);
        let err = store.create("Other", "FOCUS", "open browser", false);
        assert!(matches!(err, Err(AssistantError::CommandConflict(_))));
    }

    #[test]
    fn test_collision_includes_disabled_entries() {
        let store = store_with(&[("Focus", "focus", "open editor", false)]);
        let id = store.list()[0].id;
        store.set_enabled(id, false).unwrap();
        let err = store.create("Focus", "other trigger", "open browser", false);
        assert!(matches!(err, Err(AssistantError::CommandConflict(_))));
    }

    #[test]
    fn test_update_excludes_self_from_collision() {
        let store = store_with(&[("Focus", "focus", "open editor", false)]);
        let id = store.list()[0].id;
        // re-saving the same trigger on itself is not a conflict
        let updated = store
            .update(
                id,
                CustomCommandUpdate {
                    trigger: Some("focus".into()),
                    action: Some("open ide".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.action, "open ide");
    }

    #[test]
    fn test_longest_trigger_wins() {
        let store = store_with(&[
            ("Start", "start", "open launcher", false),
            ("Sprint", "start sprint", "open timer", false),
        ]);
        let matched = store.match_command("start sprint").unwrap();
        assert_eq!(matched.command.trigger, "start sprint");
        assert_eq!(matched.args, "");
    }

    #[test]
    fn test_trigger_with_args() {
        let store = store_with(&[("Go", "go", "open {args}", false)]);
        let matched = store.match_command("go steam library").unwrap();
        assert_eq!(matched.args, "steam library");
    }

    #[test]
    fn test_match_by_display_name() {
        let store = store_with(&[("Morning Boost", "boost", "run morning routine", false)]);
        let matched = store.match_command("Morning  Boost").unwrap();
        assert_eq!(matched.command.trigger, "boost");
    }

    #[test]
    fn test_disabled_commands_never_match() {
        let store = store_with(&[("Focus", "focus", "open editor", false)]);
        let id = store.list()[0].id;
        store.set_enabled(id, false).unwrap();
        assert!(store.match_command("focus").is_none());
    }

    #[test]
    fn test_build_target_template_substitution() {
        let store = store_with(&[("Open", "o", "open {args}", false)]);
        let cmd = &store.list()[0];
        assert_eq!(CustomCommandStore::build_target(cmd, "chrome"), "open chrome");
    }

    #[test]
    fn test_build_target_pass_through() {
        let store = store_with(&[("Chrome", "c", "open chrome", true)]);
        let cmd = &store.list()[0];
        assert_eq!(
            CustomCommandStore::build_target(cmd, "now"),
            "open chrome now"
        );
        assert_eq!(CustomCommandStore::build_target(cmd, ""), "open chrome");
    }

    #[test]
    fn test_build_target_verbatim() {
        let store = store_with(&[("Chrome", "c", "open chrome", false)]);
        let cmd = &store.list()[0];
        assert_eq!(
            CustomCommandStore::build_target(cmd, "ignored"),
            "open chrome"
        );
    }

    #[test]
    fn test_delete_missing_is_an_error() {
        let store = CustomCommandStore::in_memory();
        assert!(matches!(
            store.delete(RecordId::new()),
            Err(AssistantError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        {
            let store = CustomCommandStore::open(&path).unwrap();
            store.create("Focus", "focus", "open editor", false).unwrap();
        }
        let reopened = CustomCommandStore::open(&path).unwrap();
        let commands = reopened.list();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].trigger, "focus");
    }
}

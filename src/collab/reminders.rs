//! Reminder/alarm store mutated by resolved intents
//!
//! Scheduling and firing are out of the engine's scope; this is the
//! persistence seam the set-reminder and set-alarm builtins write through.

use crate::core::error::{AssistantError, Result};
use crate::core::types::RecordId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Reminder,
    Alarm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: RecordId,
    pub kind: ReminderKind,
    pub title: String,
    pub due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub trait ReminderStore: Send + Sync {
    fn add(&self, kind: ReminderKind, title: &str, due: DateTime<Utc>) -> Result<Reminder>;
    fn list(&self) -> Result<Vec<Reminder>>;
}

/// JSON-file store; without a path it is purely in-memory
pub struct JsonReminderStore {
    path: Option<PathBuf>,
    reminders: RwLock<Vec<Reminder>>,
}

impl JsonReminderStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            reminders: RwLock::new(Vec::new()),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let reminders = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                AssistantError::Store(format!("Corrupt reminder store {}: {}", path.display(), e))
            })?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            reminders: RwLock::new(reminders),
        })
    }

    fn persist(&self, reminders: &[Reminder]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(reminders)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl ReminderStore for JsonReminderStore {
    fn add(&self, kind: ReminderKind, title: &str, due: DateTime<Utc>) -> Result<Reminder> {
        let reminder = Reminder {
            id: RecordId::new(),
            kind,
            title: title.to_string(),
            due,
            created_at: Utc::now(),
        };
        let mut reminders = self.reminders.write();
        reminders.push(reminder.clone());
        self.persist(&reminders)?;
        Ok(reminder)
    }

    fn list(&self) -> Result<Vec<Reminder>> {
        let mut reminders = self.reminders.read().clone();
        reminders.sort_by_key(|r| r.due);
        Ok(reminders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_list_sorted_by_due_time() {
        let store = JsonReminderStore::in_memory();
        let now = Utc::now();
        store
            .add(ReminderKind::Reminder, "later", now + Duration::hours(2))
            .unwrap();
        store
            .add(ReminderKind::Alarm, "sooner", now + Duration::minutes(5))
            .unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed[0].title, "sooner");
        assert_eq!(listed[1].title, "later");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        {
            let store = JsonReminderStore::open(&path).unwrap();
            store
                .add(ReminderKind::Reminder, "water plants", Utc::now())
                .unwrap();
        }
        let reopened = JsonReminderStore::open(&path).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }
}

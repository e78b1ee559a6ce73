//! Built-in slash commands and intent execution

use crate::collab::ReminderKind;
use crate::core::types::{ActionResult, DispatchContext, DispatchSource, PermissionLevel};
use crate::intent::{Intent, IntentKind};
use crate::state::AssistantState;
use chrono::{DateTime, Duration, Local, Utc};

use super::dispatcher::Dispatcher;

const HELP_TEXT: &str = "Commands: open <app>, play/pause, remind me to <x> in <n>m, \
set alarm for <hh:mm>, run <name> routine, list reminders, system info. \
Slash: /help /mode <m> /plugins /history /reload /ask <question>";

/// Permission tier required to execute a built-in intent
pub(crate) fn required_level(kind: IntentKind) -> PermissionLevel {
    match kind {
        // routines fan out into arbitrary commands
        IntentKind::RunRoutine => PermissionLevel::Confirm,
        _ => PermissionLevel::Safe,
    }
}

impl Dispatcher {
    /// MATCH_BUILTIN: slash commands (plus bare `help`). Returns `None`
    /// when the command is not a builtin, letting resolution fall through
    /// to intent parsing.
    pub(crate) async fn try_slash(
        &self,
        state: &mut AssistantState,
        trimmed: &str,
        normalized: &str,
        bypass: bool,
    ) -> Option<(ActionResult, bool)> {
        if !trimmed.starts_with('/') && normalized != "help" {
            return None;
        }
        let (command, _) = split_word(normalized);
        // argument text keeps the user's casing
        let (_, rest) = split_word(trimmed);

        let outcome = match command {
            "/help" | "help" => (ActionResult::ok(HELP_TEXT), true),
            "/mode" => {
                if rest.is_empty() {
                    (ActionResult::fail("Usage: /mode <name>"), false)
                } else {
                    state.mode = rest.to_lowercase();
                    (ActionResult::ok(format!("Mode set to {}", state.mode)), true)
                }
            }
            "/plugins" => {
                let plugins = self.plugins.list();
                let lines: Vec<String> = plugins
                    .iter()
                    .map(|p| {
                        format!(
                            "{} v{} [{}] ({})",
                            p.manifest.name,
                            p.manifest.version,
                            if p.enabled { "enabled" } else { "disabled" },
                            p.manifest.entry_command
                        )
                    })
                    .collect();
                let message = if lines.is_empty() {
                    "No plugins installed".to_string()
                } else {
                    lines.join("; ")
                };
                let data = serde_json::to_value(&plugins).ok();
                (
                    ActionResult {
                        ok: true,
                        message,
                        data,
                        needs_confirmation: false,
                    },
                    true,
                )
            }
            "/history" => {
                let lines: Vec<String> = state
                    .history
                    .iter()
                    .rev()
                    .take(10)
                    .map(|e| format!("{} [{}]", e.command, if e.ok { "ok" } else { "failed" }))
                    .collect();
                let message = if lines.is_empty() {
                    "No history yet".to_string()
                } else {
                    lines.join("; ")
                };
                (ActionResult::ok(message), true)
            }
            "/reload" => {
                if !self.guard.can_run(PermissionLevel::Admin) {
                    return Some((
                        ActionResult::fail("Permission denied: /reload requires admin"),
                        false,
                    ));
                }
                if self.guard.needs_confirmation(PermissionLevel::Admin, bypass) {
                    return Some((
                        ActionResult::confirmation_required("/reload requires confirmation"),
                        false,
                    ));
                }
                (self.reload(), true)
            }
            "/ask" => {
                if rest.is_empty() {
                    (ActionResult::fail("Usage: /ask <question>"), false)
                } else {
                    match &self.llm {
                        None => (ActionResult::fail("No language model configured"), false),
                        Some(client) => match client.ask(rest).await {
                            Ok(answer) => (ActionResult::ok(answer), true),
                            Err(e) => (ActionResult::fail(e.to_string()), true),
                        },
                    }
                }
            }
            other => (
                ActionResult::fail(format!("Unknown command '{}'", other)),
                false,
            ),
        };
        Some(outcome)
    }

    fn reload(&self) -> ActionResult {
        if let Err(e) = self.custom.reload() {
            return ActionResult::fail(format!("Reload failed: {}", e));
        }
        let plugin_count = self.plugins.discover();
        let (rule_count, routine_count) = match &self.rules_path {
            Some(path) => match crate::automation::load_rules(path) {
                Ok(file) => {
                    let counts = (file.rules.len(), file.routines.len());
                    self.replace_rules(file.rules, file.routines);
                    counts
                }
                Err(e) => return ActionResult::fail(format!("Reload failed: {}", e)),
            },
            None => (self.rules.read().len(), self.routines.read().len()),
        };
        ActionResult::ok(format!(
            "Reloaded: {} plugin(s), {} rule(s), {} routine(s)",
            plugin_count, rule_count, routine_count
        ))
    }

    /// EXECUTE for parsed intents
    pub(crate) async fn execute_intent(
        &self,
        state: &mut AssistantState,
        intent: &Intent,
        bypass: bool,
        ctx: DispatchContext,
    ) -> ActionResult {
        match intent.kind {
            IntentKind::OpenApp => {
                let Some(app) = intent.entity("app") else {
                    return ActionResult::fail("No application name given");
                };
                match self.launcher.launch(app) {
                    Ok(()) => ActionResult::ok(format!("Launching {}", app)),
                    Err(e) => ActionResult::fail(e.to_string()),
                }
            }
            IntentKind::MediaControl => {
                let action = intent.entity("media_action").unwrap_or("play");
                ActionResult::ok_with(
                    format!("Media: {}", action),
                    serde_json::json!({
                        "action": action,
                        "track": intent.entity("track"),
                    }),
                )
            }
            IntentKind::SetReminder => self.add_reminder(intent, ReminderKind::Reminder),
            IntentKind::SetAlarm => self.add_reminder(intent, ReminderKind::Alarm),
            IntentKind::ListReminders => match self.reminders.list() {
                Ok(reminders) if reminders.is_empty() => ActionResult::ok("No reminders set"),
                Ok(reminders) => {
                    let lines: Vec<String> = reminders
                        .iter()
                        .map(|r| {
                            format!(
                                "{} at {}",
                                r.title,
                                r.due.with_timezone(&Local).format("%H:%M")
                            )
                        })
                        .collect();
                    let data = serde_json::to_value(&reminders).ok();
                    ActionResult {
                        ok: true,
                        message: lines.join("; "),
                        data,
                        needs_confirmation: false,
                    }
                }
                Err(e) => ActionResult::fail(e.to_string()),
            },
            IntentKind::SystemInfo => match self.telemetry.snapshot() {
                Ok(snapshot) => {
                    let message = snapshot.summary();
                    match serde_json::to_value(&snapshot) {
                        Ok(data) => ActionResult::ok_with(message, data),
                        Err(_) => ActionResult::ok(message),
                    }
                }
                Err(e) => ActionResult::fail(e.to_string()),
            },
            IntentKind::RunRoutine => self.run_routine(state, intent, bypass, ctx).await,
            IntentKind::Unknown => ActionResult::fail(format!(
                "I don't know how to handle '{}'",
                intent.entity("raw").unwrap_or_default()
            )),
        }
    }

    fn add_reminder(&self, intent: &Intent, kind: ReminderKind) -> ActionResult {
        let due = if let Some(minutes) = intent
            .entity("delay_minutes")
            .and_then(|m| m.parse::<i64>().ok())
        {
            Some(Utc::now() + Duration::minutes(minutes))
        } else {
            intent.entity("time").and_then(next_occurrence)
        };
        let Some(due) = due else {
            return ActionResult::fail("When? Say e.g. 'in 20m' or a time like 07:30");
        };

        let title = intent
            .entity("title")
            .filter(|t| !t.is_empty())
            .unwrap_or(match kind {
                ReminderKind::Reminder => "Reminder",
                ReminderKind::Alarm => "Alarm",
            });

        match self.reminders.add(kind, title, due) {
            Ok(reminder) => {
                let local = reminder.due.with_timezone(&Local);
                let message = format!("{} set for {}", title, local.format("%H:%M"));
                match serde_json::to_value(&reminder) {
                    Ok(data) => ActionResult::ok_with(message, data),
                    Err(_) => ActionResult::ok(message),
                }
            }
            Err(e) => ActionResult::fail(e.to_string()),
        }
    }

    async fn run_routine(
        &self,
        state: &mut AssistantState,
        intent: &Intent,
        bypass: bool,
        ctx: DispatchContext,
    ) -> ActionResult {
        let Some(name) = intent.entity("routine") else {
            return ActionResult::fail("Which routine?");
        };
        let routine = self
            .routines
            .read()
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned();
        let Some(routine) = routine else {
            return ActionResult::fail(format!("No routine named '{}'", name));
        };

        let mut succeeded = 0;
        for step in &routine.steps {
            // approval of the routine covers its steps
            let result = self
                .resolve(state, step, bypass, ctx.descend(DispatchSource::Routine))
                .await;
            if result.ok {
                succeeded += 1;
            } else {
                tracing::warn!("routine '{}' step '{}' failed: {}", name, step, result.message);
            }
        }
        ActionResult::ok(format!(
            "Routine '{}' finished: {}/{} steps succeeded",
            routine.name,
            succeeded,
            routine.steps.len()
        ))
    }
}

/// Next local occurrence of `HH:MM`, rolling to tomorrow when already past
fn next_occurrence(time: &str) -> Option<DateTime<Utc>> {
    let (h, m) = time.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    let now = Local::now();
    let naive = now.date_naive().and_hms_opt(h, m, 0)?;
    let candidate = match naive.and_local_timezone(Local) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => return None,
    };
    let candidate = if candidate <= now {
        candidate + Duration::days(1)
    } else {
        candidate
    };
    Some(candidate.with_timezone(&Utc))
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_levels() {
        assert_eq!(required_level(IntentKind::OpenApp), PermissionLevel::Safe);
        assert_eq!(required_level(IntentKind::SystemInfo), PermissionLevel::Safe);
        assert_eq!(required_level(IntentKind::RunRoutine), PermissionLevel::Confirm);
    }

    #[test]
    fn test_next_occurrence_is_in_the_future() {
        let due = next_occurrence("07:30").unwrap();
        assert!(due > Utc::now());
        assert!(due <= Utc::now() + Duration::days(1));
    }

    #[test]
    fn test_next_occurrence_rejects_garbage() {
        assert!(next_occurrence("notatime").is_none());
        assert!(next_occurrence("7").is_none());
    }

    #[test]
    fn test_split_word() {
        assert_eq!(split_word("/mode gaming"), ("/mode", "gaming"));
        assert_eq!(split_word("/help"), ("/help", ""));
    }
}

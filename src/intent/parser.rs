//! Rule-based parsing of normalized command text into structured intents
//!
//! Classification is a fixed sequence of mutually exclusive checks, most
//! specific first. Entity extraction uses targeted patterns for relative
//! delays (`in 20m`, `in 2h`) and absolute clock times (`HH:MM`); titles are
//! the remaining free text with recognized tokens stripped. Parsing is a
//! pure function with no failure mode: unmatched input falls back to
//! `Unknown` with the raw text preserved.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Parsed intent with extracted entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    /// Parser's confidence in the classification (0.0 - 1.0).
    /// Currently advisory: no decision point thresholds on it.
    pub confidence: f32,
    pub entities: HashMap<String, String>,
}

impl Intent {
    fn new(kind: IntentKind, confidence: f32) -> Self {
        Self {
            kind,
            confidence,
            entities: HashMap::new(),
        }
    }

    fn with_entity(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entities.insert(key.to_string(), value.into());
        self
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }
}

/// The fixed set of built-in intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    OpenApp,
    MediaControl,
    SetReminder,
    SetAlarm,
    RunRoutine,
    ListReminders,
    SystemInfo,
    Unknown,
}

fn delay_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bin\s+(\d{1,3})\s*(m|min|mins|minute|minutes|h|hr|hrs|hour|hours)\b")
            .expect("delay pattern")
    })
}

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("clock pattern"))
}

fn routine_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:run|start)\s+(?:the\s+)?(?:routine\s+(.+)|(.+?)\s+routine)$")
            .expect("routine pattern")
    })
}

/// Parse normalized (lowercase, whitespace-collapsed) text into an intent
pub fn parse(text: &str) -> Intent {
    if let Some(intent) = match_system_info(text) {
        return intent;
    }
    if let Some(intent) = match_list_reminders(text) {
        return intent;
    }
    if let Some(intent) = match_set_alarm(text) {
        return intent;
    }
    if let Some(intent) = match_set_reminder(text) {
        return intent;
    }
    if let Some(intent) = match_run_routine(text) {
        return intent;
    }
    if let Some(intent) = match_media_control(text) {
        return intent;
    }
    if let Some(intent) = match_open_app(text) {
        return intent;
    }

    Intent::new(IntentKind::Unknown, 0.2).with_entity("raw", text)
}

fn match_system_info(text: &str) -> Option<Intent> {
    let matched = text == "system info"
        || text == "system status"
        || text.starts_with("system info ")
        || text.contains("cpu usage")
        || text.contains("ram usage")
        || text.contains("memory usage");
    matched.then(|| Intent::new(IntentKind::SystemInfo, 0.95))
}

fn match_list_reminders(text: &str) -> Option<Intent> {
    let matched = text == "reminders"
        || text == "my reminders"
        || text.starts_with("list reminders")
        || text.starts_with("show reminders")
        || text.starts_with("list my reminders");
    matched.then(|| Intent::new(IntentKind::ListReminders, 0.95))
}

fn match_set_alarm(text: &str) -> Option<Intent> {
    if !(text.contains("alarm") || text.starts_with("wake me")) {
        return None;
    }
    let mut intent = Intent::new(IntentKind::SetAlarm, 0.9);
    if let Some(time) = extract_clock(text) {
        intent = intent.with_entity("time", time);
    } else if let Some(minutes) = extract_delay_minutes(text) {
        intent = intent.with_entity("delay_minutes", minutes.to_string());
    }
    Some(intent)
}

fn match_set_reminder(text: &str) -> Option<Intent> {
    if !(text.starts_with("remind me") || text.contains("reminder")) {
        return None;
    }
    let mut intent = Intent::new(IntentKind::SetReminder, 0.9);
    if let Some(minutes) = extract_delay_minutes(text) {
        intent = intent.with_entity("delay_minutes", minutes.to_string());
    }
    if let Some(time) = extract_clock(text) {
        intent = intent.with_entity("time", time);
    }
    let title = extract_reminder_title(text);
    if !title.is_empty() {
        intent = intent.with_entity("title", title);
    }
    Some(intent)
}

fn match_run_routine(text: &str) -> Option<Intent> {
    let caps = routine_regex().captures(text)?;
    let name = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())?;
    if name.is_empty() {
        return None;
    }
    Some(Intent::new(IntentKind::RunRoutine, 0.9).with_entity("routine", name))
}

fn match_media_control(text: &str) -> Option<Intent> {
    let action = match text {
        "pause" | "pause music" => "pause",
        "resume" | "resume music" | "play music" => "play",
        "next" | "skip" | "next track" | "skip track" => "next",
        "stop music" => "stop",
        _ => {
            if let Some(track) = text.strip_prefix("play ") {
                return Some(
                    Intent::new(IntentKind::MediaControl, 0.8)
                        .with_entity("media_action", "play")
                        .with_entity("track", track.trim()),
                );
            }
            return None;
        }
    };
    Some(Intent::new(IntentKind::MediaControl, 0.85).with_entity("media_action", action))
}

fn match_open_app(text: &str) -> Option<Intent> {
    let rest = text
        .strip_prefix("open ")
        .or_else(|| text.strip_prefix("launch "))
        .or_else(|| text.strip_prefix("start "))?;
    let app = rest.trim();
    if app.is_empty() {
        return None;
    }
    Some(Intent::new(IntentKind::OpenApp, 0.85).with_entity("app", app))
}

/// Extract a relative delay as whole minutes (`in 20m` -> 20, `in 2h` -> 120)
pub fn extract_delay_minutes(text: &str) -> Option<u32> {
    let caps = delay_regex().captures(text)?;
    let amount: u32 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str();
    if unit.starts_with('h') {
        Some(amount * 60)
    } else {
        Some(amount)
    }
}

/// Extract an absolute clock time as the matched `HH:MM` text
pub fn extract_clock(text: &str) -> Option<String> {
    clock_regex()
        .find(text)
        .map(|m| m.as_str().to_string())
}

fn extract_reminder_title(text: &str) -> String {
    let mut remainder = text.to_string();
    if let Some(range) = delay_regex().find(&remainder).map(|m| m.range()) {
        remainder.replace_range(range, "");
    }
    if let Some(range) = clock_regex().find(&remainder).map(|m| m.range()) {
        remainder.replace_range(range, "");
    }
    let mut title = remainder
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    for prefix in [
        "remind me to",
        "remind me",
        "set a reminder to",
        "set a reminder for",
        "set a reminder",
        "set reminder",
    ] {
        if let Some(rest) = title.strip_prefix(prefix) {
            title = rest.trim().to_string();
            break;
        }
    }
    // leftover connective from a stripped time ("... at 18:00")
    for suffix in [" at", " in"] {
        if let Some(rest) = title.strip_suffix(suffix) {
            title = rest.trim().to_string();
        }
    }
    title
}

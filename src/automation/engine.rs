//! Stateless automation rule evaluation
//!
//! `evaluate` is a pure function over the just-run command and the current
//! mode/clock; the caller injects the clock so evaluation stays
//! deterministic under test. All conditions of a rule must hold. Malformed
//! `time_range` strings evaluate to false, never panic.

use crate::state::Suggestion;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Case-insensitive substring match against the dispatched command
    ContainsCommand { value: String },
    /// Exact match against the current mode
    ModeIs { value: String },
    /// `HH:MM-HH:MM` window, wrapping past midnight when start > end
    TimeRange { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    RunCommand { value: String },
    SetMode { value: String },
    ShowHint { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

/// Inputs to one evaluation pass
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Normalized command that just ran
    pub command: String,
    pub mode: String,
    /// Minutes since local midnight
    pub minutes_now: u16,
}

/// Everything the matched rules produced
#[derive(Debug, Clone, Default)]
pub struct AutomationOutcome {
    /// Commands to re-dispatch, in rule order
    pub follow_ups: Vec<String>,
    /// Mode change; when several rules set one, the last wins
    pub mode: Option<String>,
    pub suggestions: Vec<Suggestion>,
}

/// Evaluate every enabled rule against the context
pub fn evaluate(rules: &[AutomationRule], ctx: &EvalContext) -> AutomationOutcome {
    let mut outcome = AutomationOutcome::default();

    for rule in rules.iter().filter(|r| r.enabled) {
        if !rule.conditions.iter().all(|c| condition_holds(c, ctx)) {
            continue;
        }
        for action in &rule.actions {
            match action {
                RuleAction::RunCommand { value } => outcome.follow_ups.push(value.clone()),
                RuleAction::SetMode { value } => outcome.mode = Some(value.clone()),
                RuleAction::ShowHint { value } => outcome.suggestions.push(Suggestion {
                    rule: rule.name.clone(),
                    text: value.clone(),
                }),
            }
        }
    }

    outcome
}

fn condition_holds(condition: &RuleCondition, ctx: &EvalContext) -> bool {
    match condition {
        RuleCondition::ContainsCommand { value } => ctx
            .command
            .to_lowercase()
            .contains(&value.to_lowercase()),
        RuleCondition::ModeIs { value } => ctx.mode == *value,
        RuleCondition::TimeRange { value } => match parse_time_range(value) {
            Some((start, end)) => minutes_in_range(ctx.minutes_now, start, end),
            None => false,
        },
    }
}

/// Parse `HH:MM-HH:MM` into minute offsets from midnight
pub fn parse_time_range(s: &str) -> Option<(u16, u16)> {
    let (start, end) = s.split_once('-')?;
    Some((parse_clock_minutes(start.trim())?, parse_clock_minutes(end.trim())?))
}

fn parse_clock_minutes(s: &str) -> Option<u16> {
    let (h, m) = s.split_once(':')?;
    let h: u16 = h.trim().parse().ok()?;
    let m: u16 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Inclusive window check, wrapping past midnight when start > end
pub fn minutes_in_range(now: u16, start: u16, end: u16) -> bool {
    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

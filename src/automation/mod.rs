//! Condition-action rules reacting to dispatched commands

pub mod engine;
mod loader;

pub use engine::{
    evaluate, AutomationOutcome, AutomationRule, EvalContext, RuleAction, RuleCondition,
};
pub use loader::{load_rules, parse_rules, Routine, RulesFile};

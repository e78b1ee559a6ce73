//! Integration tests for automation chaining through the dispatcher

use famulus::automation::{AutomationRule, RuleAction, RuleCondition};
use famulus::collab::AppLauncher;
use famulus::core::config::AssistantConfig;
use famulus::core::types::PermissionLevel;
use famulus::dispatch::Dispatcher;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct RecordingLauncher {
    launched: Arc<Mutex<Vec<String>>>,
}

impl AppLauncher for RecordingLauncher {
    fn launch(&self, app: &str) -> famulus::core::error::Result<()> {
        self.launched.lock().unwrap().push(app.to_string());
        Ok(())
    }
}

fn test_dispatcher(dir: &std::path::Path) -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
    let config = AssistantConfig {
        data_dir: dir.join("data"),
        plugin_dir: dir.join("plugins"),
        permission_ceiling: PermissionLevel::Admin,
        ..Default::default()
    };
    let launched = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new(&config).unwrap().with_launcher(Arc::new(
        RecordingLauncher {
            launched: Arc::clone(&launched),
        },
    ));
    (dispatcher, launched)
}

fn rule(conditions: Vec<RuleCondition>, actions: Vec<RuleAction>) -> AutomationRule {
    AutomationRule {
        id: Uuid::new_v4(),
        name: "rule under test".into(),
        enabled: true,
        conditions,
        actions,
    }
}

/// Test 1: a matched rule sets the mode and surfaces exactly one hint
#[tokio::test]
async fn test_rule_sets_mode_and_hint() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, _) = test_dispatcher(dir.path());
    dispatcher.replace_rules(
        vec![rule(
            vec![RuleCondition::ContainsCommand {
                value: "open steam".into(),
            }],
            vec![
                RuleAction::SetMode {
                    value: "gaming".into(),
                },
                RuleAction::ShowHint {
                    value: "Mute notifications?".into(),
                },
            ],
        )],
        Vec::new(),
    );

    let outcome = dispatcher.dispatch("open steam", false).await;
    assert!(outcome.result.ok);
    assert_eq!(outcome.state.mode, "gaming");
    assert_eq!(outcome.state.suggestions.len(), 1);
    assert_eq!(outcome.state.suggestions[0].text, "Mute notifications?");
}

/// Test 2: follow-up commands run at depth+1 without their own history
#[tokio::test]
async fn test_follow_up_runs_without_history() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, launched) = test_dispatcher(dir.path());
    dispatcher.replace_rules(
        vec![rule(
            vec![RuleCondition::ContainsCommand {
                value: "focus".into(),
            }],
            vec![RuleAction::RunCommand {
                value: "open editor".into(),
            }],
        )],
        Vec::new(),
    );

    let outcome = dispatcher.dispatch("focus time", false).await;
    assert_eq!(launched.lock().unwrap().as_slice(), ["editor"]);
    // the follow-up does not pollute history
    assert_eq!(outcome.state.history.len(), 1);
    assert_eq!(outcome.state.history[0].command, "focus time");
}

/// Test 3: a rule that re-triggers itself is stopped by the depth ceiling
#[tokio::test]
async fn test_self_triggering_rule_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, launched) = test_dispatcher(dir.path());
    dispatcher.replace_rules(
        vec![rule(
            vec![RuleCondition::ContainsCommand {
                value: "open".into(),
            }],
            vec![RuleAction::RunCommand {
                value: "open editor".into(),
            }],
        )],
        Vec::new(),
    );

    let outcome = dispatcher.dispatch("open steam", false).await;
    assert!(outcome.result.ok);
    let launched = launched.lock().unwrap();
    // steam at depth 0; the editor follow-up re-matches at depths 1-4,
    // then the ceiling cuts the chain
    assert_eq!(launched.iter().filter(|a| *a == "steam").count(), 1);
    assert_eq!(launched.iter().filter(|a| *a == "editor").count(), 4);
    assert_eq!(outcome.state.history.len(), 1);
}

/// Test 4: mode-conditioned rules only fire in that mode
#[tokio::test]
async fn test_mode_condition_through_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, launched) = test_dispatcher(dir.path());
    dispatcher.replace_rules(
        vec![rule(
            vec![
                RuleCondition::ContainsCommand {
                    value: "pause".into(),
                },
                RuleCondition::ModeIs {
                    value: "gaming".into(),
                },
            ],
            vec![RuleAction::RunCommand {
                value: "open overlay".into(),
            }],
        )],
        Vec::new(),
    );

    dispatcher.dispatch("pause", false).await;
    assert!(launched.lock().unwrap().is_empty());

    dispatcher.dispatch("/mode gaming", false).await;
    dispatcher.dispatch("pause", false).await;
    assert_eq!(launched.lock().unwrap().as_slice(), ["overlay"]);
}

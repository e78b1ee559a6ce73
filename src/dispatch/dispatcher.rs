//! The command-resolution state machine
//!
//! Resolution order: custom commands, then plugins, then built-in slash
//! commands, then intent parsing. Permission gating happens on the resolved
//! action. After any execution (successful or not) automation rules are
//! evaluated against the just-run command and their follow-ups dispatched at
//! `depth+1`. History records top-level invocations only. A depth counter
//! bounds every re-entry path; exceeding the ceiling is terminal.

use crate::automation::{self, AutomationRule, EvalContext, Routine};
use crate::collab::{
    AppLauncher, JsonReminderStore, ProcTelemetry, ProcessLauncher, ReminderStore,
    TelemetryProvider,
};
use crate::core::config::{AssistantConfig, MAX_COMMAND_LEN, MAX_DISPATCH_DEPTH};
use crate::core::error::Result;
use crate::core::types::{
    normalize_command, ActionResult, DispatchContext, DispatchSource,
};
use crate::custom::CustomCommandStore;
use crate::llm::LlmClient;
use crate::permission::PermissionGuard;
use crate::plugin::PluginHost;
use crate::state::{AssistantState, HistoryEntry};
use chrono::{Local, Timelike, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An `ActionResult` wrapped with the resulting assistant state
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: ActionResult,
    pub state: AssistantState,
}

pub struct Dispatcher {
    pub(crate) guard: PermissionGuard,
    pub(crate) custom: CustomCommandStore,
    pub(crate) plugins: PluginHost,
    pub(crate) rules: RwLock<Vec<AutomationRule>>,
    pub(crate) routines: RwLock<Vec<Routine>>,
    pub(crate) reminders: Arc<dyn ReminderStore>,
    pub(crate) telemetry: Arc<dyn TelemetryProvider>,
    pub(crate) launcher: Arc<dyn AppLauncher>,
    pub(crate) llm: Option<LlmClient>,
    pub(crate) rules_path: Option<PathBuf>,
    state: Mutex<AssistantState>,
}

impl Dispatcher {
    /// Wire up a dispatcher from configuration. Stores are opened under
    /// `data_dir`, plugins discovered under `plugin_dir`, rules and
    /// routines loaded from `rules_path`.
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let custom = CustomCommandStore::open(&config.data_dir.join("commands.json"))?;
        let reminders = JsonReminderStore::open(&config.data_dir.join("reminders.json"))?;
        let plugins = PluginHost::new(config.plugin_dir.clone(), config.sandbox.clone());
        plugins.discover();

        let rules_file = match &config.rules_path {
            Some(path) => automation::load_rules(path)?,
            None => Default::default(),
        };

        Ok(Self {
            guard: PermissionGuard::new(config.permission_ceiling),
            custom,
            plugins,
            rules: RwLock::new(rules_file.rules),
            routines: RwLock::new(rules_file.routines),
            reminders: Arc::new(reminders),
            telemetry: Arc::new(ProcTelemetry),
            launcher: Arc::new(ProcessLauncher::new(config.app_aliases.clone())),
            llm: config.llm.as_ref().map(LlmClient::new),
            rules_path: config.rules_path.clone(),
            state: Mutex::new(AssistantState::new()),
        })
    }

    /// Swap in a different launcher (tests, alternate frontends)
    pub fn with_launcher(mut self, launcher: Arc<dyn AppLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn custom(&self) -> &CustomCommandStore {
        &self.custom
    }

    pub fn plugins(&self) -> &PluginHost {
        &self.plugins
    }

    /// Replace the automation rule and routine sets wholesale
    pub fn replace_rules(&self, rules: Vec<AutomationRule>, routines: Vec<Routine>) {
        *self.rules.write() = rules;
        *self.routines.write() = routines;
    }

    /// Resolve one top-level command to completion, including any chained
    /// automations, and return the result with a state snapshot. The state
    /// lock is held for the whole resolution (single-writer discipline).
    pub async fn dispatch(&self, raw: &str, bypass_confirmation: bool) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        let result = self
            .resolve(&mut state, raw, bypass_confirmation, DispatchContext::top_level())
            .await;
        DispatchOutcome {
            result,
            state: state.clone(),
        }
    }

    /// Recursive resolution; boxed because custom delegation, automation
    /// follow-ups, and routine steps all re-enter it.
    pub(crate) fn resolve<'a>(
        &'a self,
        state: &'a mut AssistantState,
        raw: &'a str,
        bypass: bool,
        ctx: DispatchContext,
    ) -> Pin<Box<dyn Future<Output = ActionResult> + Send + 'a>> {
        Box::pin(async move {
            if ctx.depth > MAX_DISPATCH_DEPTH {
                tracing::warn!("recursion blocked at depth {} for '{}'", ctx.depth, raw);
                return ActionResult::fail(format!(
                    "Recursion blocked: dispatch depth {} exceeds the limit of {}",
                    ctx.depth, MAX_DISPATCH_DEPTH
                ));
            }

            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return ActionResult::fail("Empty command");
            }
            if trimmed.len() > MAX_COMMAND_LEN {
                return ActionResult::fail(format!(
                    "Command exceeds {} characters",
                    MAX_COMMAND_LEN
                ));
            }
            let normalized = normalize_command(trimmed);

            let (result, executed) = self
                .resolve_stages(state, trimmed, &normalized, bypass, ctx)
                .await;
            // a delegated target may itself have soft-blocked on confirmation
            let executed = executed && !result.needs_confirmation;

            if executed {
                self.chain_automation(state, &normalized, ctx).await;
            }
            if executed && ctx.write_history {
                state.record(HistoryEntry {
                    command: trimmed.to_string(),
                    ok: result.ok,
                    message: result.message.clone(),
                    source: ctx.source,
                    at: Utc::now(),
                });
            }
            result
        })
    }

    /// MATCH_CUSTOM -> MATCH_PLUGIN -> MATCH_BUILTIN -> PARSE_INTENT ->
    /// PERMISSION_CHECK -> {CONFIRM_PENDING | EXECUTE}. The bool reports
    /// whether the EXECUTE state was reached.
    async fn resolve_stages(
        &self,
        state: &mut AssistantState,
        trimmed: &str,
        normalized: &str,
        bypass: bool,
        ctx: DispatchContext,
    ) -> (ActionResult, bool) {
        // MATCH_CUSTOM: delegate to the alias target
        if let Some(matched) = self.custom.match_command(trimmed) {
            let target = CustomCommandStore::build_target(&matched.command, &matched.args);
            if normalize_command(&target) == normalized {
                return (
                    ActionResult::fail(format!(
                        "Custom command '{}' resolves to itself",
                        matched.command.name
                    )),
                    false,
                );
            }
            tracing::debug!(
                "custom command '{}' -> '{}' (depth {})",
                matched.command.name,
                target,
                ctx.depth
            );
            let result = self
                .resolve(state, &target, bypass, ctx.descend(DispatchSource::Custom))
                .await;
            return (result, true);
        }

        // MATCH_PLUGIN: gate on the manifest-declared tier, then sandbox
        if let Some((plugin, args)) = self.plugins.match_command(normalized) {
            let level = plugin.manifest.permission_level;
            if !self.guard.can_run(level) {
                return (
                    ActionResult::fail(format!(
                        "Permission denied: plugin '{}' requires {}",
                        plugin.manifest.name, level
                    )),
                    false,
                );
            }
            if self.guard.needs_confirmation(level, bypass) {
                return (
                    ActionResult::confirmation_required(format!(
                        "Plugin '{}' requires confirmation",
                        plugin.manifest.name
                    )),
                    false,
                );
            }
            let result = self
                .plugins
                .invoke(
                    &plugin,
                    normalized,
                    &args,
                    serde_json::json!({ "mode": state.mode }),
                )
                .await;
            return (result, true);
        }

        // MATCH_BUILTIN: slash commands
        if let Some(outcome) = self.try_slash(state, trimmed, normalized, bypass).await {
            return outcome;
        }

        // PARSE_INTENT + PERMISSION_CHECK
        let intent = crate::intent::parse(normalized);
        let level = super::builtin::required_level(intent.kind);
        if !self.guard.can_run(level) {
            return (
                ActionResult::fail(format!("Permission denied: action requires {}", level)),
                false,
            );
        }
        if self.guard.needs_confirmation(level, bypass) {
            return (
                ActionResult::confirmation_required(format!(
                    "'{}' requires confirmation",
                    trimmed
                )),
                false,
            );
        }
        let result = self.execute_intent(state, &intent, bypass, ctx).await;
        (result, true)
    }

    /// AUTOMATION_CHAIN: evaluate rules against the just-run command and
    /// apply what they produce. Follow-ups run sequentially at `depth+1`
    /// and never write history.
    async fn chain_automation(
        &self,
        state: &mut AssistantState,
        normalized: &str,
        ctx: DispatchContext,
    ) {
        let rules = self.rules.read().clone();
        if rules.is_empty() {
            return;
        }
        let now = Local::now();
        let outcome = automation::evaluate(
            &rules,
            &EvalContext {
                command: normalized.to_string(),
                mode: state.mode.clone(),
                minutes_now: (now.hour() * 60 + now.minute()) as u16,
            },
        );

        if let Some(mode) = outcome.mode {
            if mode != state.mode {
                tracing::info!("automation set mode '{}' -> '{}'", state.mode, mode);
                state.mode = mode;
            }
        }
        state.suggestions.extend(outcome.suggestions);

        for follow_up in outcome.follow_ups {
            let result = self
                .resolve(
                    state,
                    &follow_up,
                    false,
                    ctx.descend(DispatchSource::Automation),
                )
                .await;
            tracing::debug!(
                "automation follow-up '{}': ok={} ({})",
                follow_up,
                result.ok,
                result.message
            );
        }
    }
}

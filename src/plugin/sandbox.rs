//! Isolated, time-boxed plugin execution
//!
//! Each invocation runs in a fresh QuickJS VM on a blocking thread. The VM
//! carries a memory ceiling and an interrupt handler enforcing the
//! wall-clock deadline; a prelude replaces `fetch`, `XMLHttpRequest`,
//! `WebSocket` and `require` with stand-ins that immediately throw. Before
//! any code runs, the source is scanned for imports of networking-capable
//! modules. A plugin fault of any kind degrades to `ok:false` and can never
//! crash the host.

use crate::core::config::SandboxLimits;
use crate::core::error::{AssistantError, Result};
use crate::core::types::ActionResult;
use rquickjs::{CatchResultExt, Context, Function, Runtime, Value};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;

/// Module roots a plugin may never load. Anything that opens sockets or
/// speaks HTTP belongs here.
const FORBIDDEN_MODULES: &[&str] = &[
    "net",
    "tls",
    "dns",
    "dgram",
    "http",
    "https",
    "http2",
    "undici",
    "axios",
    "node-fetch",
    "ws",
];

/// Installed before the plugin source; network primitives throw and a
/// `module.exports` shim backs the entry contract.
const PRELUDE: &str = r#"
"use strict";
(function () {
    function blocked(name) {
        return function () {
            throw new Error("network access is blocked: " + name);
        };
    }
    globalThis.fetch = blocked("fetch");
    globalThis.XMLHttpRequest = blocked("XMLHttpRequest");
    globalThis.WebSocket = blocked("WebSocket");
    globalThis.require = function (name) {
        throw new Error("module loading is blocked: " + String(name));
    };
    globalThis.module = { exports: {} };
    globalThis.exports = globalThis.module.exports;
})();
"#;

/// Installed after the plugin source. Picks the exported handler
/// (a function, or an object with `handle`), invokes it with the context,
/// and hands the raw return value back as JSON for host-side normalization.
const HARNESS: &str = r#"
globalThis.__run = function (ctxJson) {
    var ctx = JSON.parse(ctxJson);
    var handler = null;
    var exported = globalThis.module && globalThis.module.exports;
    if (typeof exported === "function") {
        handler = exported;
    } else if (exported && typeof exported.handle === "function") {
        handler = function (c) { return exported.handle(c); };
    } else if (typeof globalThis.__entry === "function") {
        handler = globalThis.__entry;
    } else if (globalThis.__entry && typeof globalThis.__entry.handle === "function") {
        handler = function (c) { return globalThis.__entry.handle(c); };
    }
    if (handler === null) {
        throw new Error("plugin entry does not export a handler");
    }
    var out = handler(ctx);
    var json = JSON.stringify(out === undefined ? null : out);
    return json === undefined ? "null" : json;
};
"#;

fn require_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"require\s*\(\s*["']([^"']+)["']\s*\)"#).expect("require pattern"))
}

fn import_from_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\b[^;'"]*?\bfrom\s+["']([^"']+)["']"#).expect("import pattern")
    })
}

fn import_bare_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bimport\s*\(?\s*["']([^"']+)["']\s*\)?"#).expect("bare import pattern")
    })
}

/// Reject source that tries to load a networking-capable module.
/// The runtime `require` stub is the backstop; this rejects before any
/// plugin code runs at all.
pub fn scan_source(source: &str) -> Result<()> {
    let mut specifiers: Vec<&str> = Vec::new();
    for caps in require_regex().captures_iter(source) {
        if let Some(m) = caps.get(1) {
            specifiers.push(m.as_str());
        }
    }
    for caps in import_from_regex().captures_iter(source) {
        if let Some(m) = caps.get(1) {
            specifiers.push(m.as_str());
        }
    }
    for caps in import_bare_regex().captures_iter(source) {
        if let Some(m) = caps.get(1) {
            specifiers.push(m.as_str());
        }
    }

    for spec in specifiers {
        let root = spec
            .strip_prefix("node:")
            .unwrap_or(spec)
            .split('/')
            .next()
            .unwrap_or(spec);
        if FORBIDDEN_MODULES.contains(&root) {
            return Err(AssistantError::Plugin(format!(
                "plugin imports blocked networking module '{}'",
                spec
            )));
        }
    }
    Ok(())
}

/// Inputs handed to the plugin handler as `context`
#[derive(Debug, Clone)]
pub struct PluginInvocation {
    pub command: String,
    pub args: String,
    /// Read-only snapshot of assistant state (currently the mode)
    pub state: serde_json::Value,
}

impl PluginInvocation {
    fn context_json(&self) -> String {
        serde_json::json!({
            "command": self.command,
            "args": self.args,
            "state": self.state,
        })
        .to_string()
    }
}

enum VmFault {
    Timeout,
    Eval(String),
}

/// Run plugin source to completion inside the sandbox.
/// The host-side timeout adds a small grace on top of the VM deadline so
/// the interrupt handler is what normally fires.
pub async fn execute(
    source: Arc<String>,
    invocation: PluginInvocation,
    limits: SandboxLimits,
) -> ActionResult {
    let ctx_json = invocation.context_json();
    let timeout = Duration::from_millis(limits.timeout_ms);
    let handle =
        tokio::task::spawn_blocking(move || run_vm(&source, &ctx_json, &limits));

    match tokio::time::timeout(timeout + Duration::from_millis(500), handle).await {
        Err(_) => ActionResult::fail(format!(
            "Plugin timed out after {}ms",
            timeout.as_millis()
        )),
        Ok(Err(join_err)) => {
            tracing::warn!("plugin worker panicked: {join_err}");
            ActionResult::fail("Plugin execution failed")
        }
        Ok(Ok(Err(VmFault::Timeout))) => ActionResult::fail(format!(
            "Plugin timed out after {}ms",
            timeout.as_millis()
        )),
        Ok(Ok(Err(VmFault::Eval(message)))) => {
            ActionResult::fail(format!("Plugin failed: {}", message))
        }
        Ok(Ok(Ok(raw))) => match serde_json::from_str(&raw) {
            Ok(value) => normalize_result(value),
            Err(_) => ActionResult::ok("Plugin finished"),
        },
    }
}

fn run_vm(
    source: &str,
    ctx_json: &str,
    limits: &SandboxLimits,
) -> std::result::Result<String, VmFault> {
    let runtime = Runtime::new().map_err(|e| VmFault::Eval(e.to_string()))?;
    runtime.set_memory_limit(limits.memory_limit_bytes);

    let deadline = Instant::now() + Duration::from_millis(limits.timeout_ms);
    runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

    let context = Context::full(&runtime).map_err(|e| VmFault::Eval(e.to_string()))?;
    let timed_out = move || Instant::now() >= deadline;

    context.with(|ctx| {
        let _: Value = ctx
            .eval(PRELUDE)
            .catch(&ctx)
            .map_err(|e| VmFault::Eval(e.to_string()))?;

        let entry: Value = ctx.eval(source).catch(&ctx).map_err(|e| {
            if timed_out() {
                VmFault::Timeout
            } else {
                VmFault::Eval(e.to_string())
            }
        })?;
        ctx.globals()
            .set("__entry", entry)
            .catch(&ctx)
            .map_err(|e| VmFault::Eval(e.to_string()))?;

        let _: Value = ctx
            .eval(HARNESS)
            .catch(&ctx)
            .map_err(|e| VmFault::Eval(e.to_string()))?;

        let run: Function = ctx
            .globals()
            .get("__run")
            .catch(&ctx)
            .map_err(|e| VmFault::Eval(e.to_string()))?;
        run.call::<_, String>((ctx_json,)).catch(&ctx).map_err(|e| {
            if timed_out() {
                VmFault::Timeout
            } else {
                VmFault::Eval(e.to_string())
            }
        })
    })
}

/// Map a plugin's raw return value onto the uniform `ActionResult`:
/// string -> success message, falsy -> generic success, `{ok, message,
/// data}` honored, anything else -> generic success.
pub fn normalize_result(value: serde_json::Value) -> ActionResult {
    use serde_json::Value as Json;
    match value {
        Json::String(s) if !s.is_empty() => ActionResult::ok(s),
        Json::Object(map) => {
            let Some(ok) = map.get("ok").and_then(Json::as_bool) else {
                return ActionResult::ok("Plugin finished");
            };
            let message = map
                .get("message")
                .and_then(Json::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if ok {
                        "Plugin finished".to_string()
                    } else {
                        "Plugin reported failure".to_string()
                    }
                });
            let data = map.get("data").filter(|d| !d.is_null()).cloned();
            ActionResult {
                ok,
                message,
                data,
                needs_confirmation: false,
            }
        }
        // null, false, 0, "" and any other scalar shape
        _ => ActionResult::ok("Plugin finished"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SandboxLimits {
        SandboxLimits {
            timeout_ms: 2_000,
            memory_limit_bytes: 32 * 1024 * 1024,
        }
    }

    fn invocation(command: &str, args: &str) -> PluginInvocation {
        PluginInvocation {
            command: command.to_string(),
            args: args.to_string(),
            state: serde_json::json!({ "mode": "normal" }),
        }
    }

    async fn run(source: &str) -> ActionResult {
        execute(Arc::new(source.to_string()), invocation("test cmd", "arg"), limits()).await
    }

    #[tokio::test]
    async fn test_function_export_returning_string() {
        let result = run("module.exports = function (ctx) { return 'hello ' + ctx.args; };").await;
        assert!(result.ok);
        assert_eq!(result.message, "hello arg");
    }

    #[tokio::test]
    async fn test_handle_object_export() {
        let source = r#"
            module.exports = {
                handle: function (ctx) {
                    return { ok: true, message: "handled " + ctx.command, data: { n: 3 } };
                }
            };
        "#;
        let result = run(source).await;
        assert!(result.ok);
        assert_eq!(result.message, "handled test cmd");
        assert_eq!(result.data.unwrap()["n"], 3);
    }

    #[tokio::test]
    async fn test_completion_value_handler() {
        // no module.exports assignment; the script's completion value is used
        let result = run("(function (ctx) { return 'from completion'; })").await;
        assert!(result.ok);
        assert_eq!(result.message, "from completion");
    }

    #[tokio::test]
    async fn test_falsy_return_is_generic_success() {
        let result = run("module.exports = function () { return null; };").await;
        assert!(result.ok);
        assert_eq!(result.message, "Plugin finished");
    }

    #[tokio::test]
    async fn test_failure_shape_is_honored() {
        let result =
            run("module.exports = function () { return { ok: false, message: 'nope' }; };").await;
        assert!(!result.ok);
        assert_eq!(result.message, "nope");
    }

    #[tokio::test]
    async fn test_fetch_is_blocked() {
        let result = run("module.exports = function () { return fetch('http://x'); };").await;
        assert!(!result.ok);
        assert!(result.message.contains("blocked"), "{}", result.message);
    }

    #[tokio::test]
    async fn test_websocket_is_blocked() {
        let result = run("module.exports = function () { new WebSocket('ws://x'); };").await;
        assert!(!result.ok);
        assert!(result.message.contains("blocked"));
    }

    #[tokio::test]
    async fn test_require_is_blocked() {
        let result = run("var h = require('http'); module.exports = function () {};").await;
        assert!(!result.ok);
        assert!(result.message.contains("blocked"));
    }

    #[tokio::test]
    async fn test_runtime_exception_degrades() {
        let result = run("module.exports = function () { throw new Error('boom'); };").await;
        assert!(!result.ok);
        assert!(result.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let source = "module.exports = function () { while (true) {} };";
        let result = execute(
            Arc::new(source.to_string()),
            invocation("spin", ""),
            SandboxLimits {
                timeout_ms: 300,
                memory_limit_bytes: 32 * 1024 * 1024,
            },
        )
        .await;
        assert!(!result.ok);
        assert!(result.message.contains("timed out"), "{}", result.message);
    }

    #[tokio::test]
    async fn test_no_handler_export() {
        let result = run("var x = 42;").await;
        assert!(!result.ok);
        assert!(result.message.contains("does not export"));
    }

    #[test]
    fn test_scan_rejects_networking_imports() {
        assert!(scan_source("const net = require('net');").is_err());
        assert!(scan_source("const h = require('node:https');").is_err());
        assert!(scan_source("import axios from 'axios';").is_err());
        assert!(scan_source("import('dns').then(m => m);").is_err());
    }

    #[test]
    fn test_scan_allows_innocuous_source() {
        assert!(scan_source("const fmt = require('./format.js');").is_ok());
        assert!(scan_source("module.exports = function () { return 1; };").is_ok());
    }

    #[test]
    fn test_normalize_shapes() {
        use serde_json::json;
        assert!(normalize_result(json!("done")).ok);
        assert_eq!(normalize_result(json!("done")).message, "done");
        assert!(normalize_result(json!(null)).ok);
        assert!(normalize_result(json!(false)).ok);
        assert!(normalize_result(json!([1, 2, 3])).ok);
        assert!(normalize_result(json!({"unrelated": 1})).ok);

        let failure = normalize_result(json!({"ok": false}));
        assert!(!failure.ok);
        assert_eq!(failure.message, "Plugin reported failure");
    }
}

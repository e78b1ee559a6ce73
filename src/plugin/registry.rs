//! Plugin discovery and routing
//!
//! Scans the plugin directory for subfolders carrying a manifest. Invalid
//! manifests are skipped with a warning, never fatal. Validated source is
//! cached keyed by `(resolved path, mtime+size)` so unchanged plugin code
//! skips re-read and re-scan across repeated invocations; a changed file is
//! reloaded transparently.

use crate::core::config::SandboxLimits;
use crate::core::error::{AssistantError, Result};
use crate::core::types::{normalize_command, ActionResult};
use crate::plugin::manifest::{PluginManifest, PluginState, MANIFEST_FILE};
use crate::plugin::sandbox::{self, PluginInvocation};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

type Fingerprint = (u64, u64);

#[derive(Clone)]
struct CachedSource {
    fingerprint: Fingerprint,
    source: Arc<String>,
}

pub struct PluginHost {
    plugin_dir: PathBuf,
    limits: SandboxLimits,
    plugins: RwLock<Vec<PluginState>>,
    cache: RwLock<HashMap<PathBuf, CachedSource>>,
}

impl PluginHost {
    pub fn new(plugin_dir: PathBuf, limits: SandboxLimits) -> Self {
        Self {
            plugin_dir,
            limits,
            plugins: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scan the plugin directory, replacing the known set. Enabled flags of
    /// surviving plugins are preserved. Returns how many plugins loaded.
    pub fn discover(&self) -> usize {
        let mut found: Vec<PluginState> = Vec::new();
        let previous: HashMap<String, bool> = self
            .plugins
            .read()
            .iter()
            .map(|p| (p.manifest.id.clone(), p.enabled))
            .collect();

        let entries = match std::fs::read_dir(&self.plugin_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    "plugin directory {} not readable: {}",
                    self.plugin_dir.display(),
                    e
                );
                *self.plugins.write() = Vec::new();
                return 0;
            }
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }
            let manifest = match std::fs::read_to_string(&manifest_path)
                .map_err(AssistantError::from)
                .and_then(|content| PluginManifest::parse(&content))
            {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!("skipping plugin at {}: {}", dir.display(), e);
                    continue;
                }
            };
            if found.iter().any(|p| p.manifest.id == manifest.id) {
                tracing::warn!(
                    "skipping plugin at {}: duplicate id '{}'",
                    dir.display(),
                    manifest.id
                );
                continue;
            }
            let enabled = previous.get(&manifest.id).copied().unwrap_or(true);
            found.push(PluginState {
                manifest,
                enabled,
                installed_at: Utc::now(),
                dir,
            });
        }

        let count = found.len();
        tracing::info!("discovered {} plugin(s)", count);
        *self.plugins.write() = found;
        count
    }

    pub fn list(&self) -> Vec<PluginState> {
        self.plugins.read().clone()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut plugins = self.plugins.write();
        let plugin = plugins
            .iter_mut()
            .find(|p| p.manifest.id == id)
            .ok_or_else(|| AssistantError::Plugin(format!("Unknown plugin '{}'", id)))?;
        plugin.enabled = enabled;
        Ok(())
    }

    /// Route a normalized command to the enabled plugin whose entry command
    /// is a case-insensitive prefix of it. The longest entry command wins.
    pub fn match_command(&self, normalized: &str) -> Option<(PluginState, String)> {
        let plugins = self.plugins.read();
        let mut candidates: Vec<&PluginState> = plugins.iter().filter(|p| p.enabled).collect();
        candidates.sort_by(|a, b| {
            b.manifest
                .entry_command
                .len()
                .cmp(&a.manifest.entry_command.len())
        });

        for plugin in candidates {
            let entry_command = normalize_command(&plugin.manifest.entry_command);
            if normalized == entry_command {
                return Some((plugin.clone(), String::new()));
            }
            if let Some(rest) = normalized.strip_prefix(&format!("{} ", entry_command)) {
                return Some((plugin.clone(), rest.trim().to_string()));
            }
        }
        None
    }

    /// Execute a routed plugin. Every fault degrades to `ok:false`.
    pub async fn invoke(
        &self,
        plugin: &PluginState,
        command: &str,
        args: &str,
        state: serde_json::Value,
    ) -> ActionResult {
        let source = match self.load_entry(plugin) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("plugin '{}' rejected: {}", plugin.manifest.id, e);
                return ActionResult::fail(format!("Plugin '{}': {}", plugin.manifest.name, e));
            }
        };

        tracing::debug!("running plugin '{}'", plugin.manifest.id);
        sandbox::execute(
            source,
            PluginInvocation {
                command: command.to_string(),
                args: args.to_string(),
                state,
            },
            self.limits.clone(),
        )
        .await
    }

    /// Resolve, guard, and load the plugin's entry file through the cache
    fn load_entry(&self, plugin: &PluginState) -> Result<Arc<String>> {
        let entry_path = resolve_entry(&plugin.dir, plugin.manifest.entry_file())?;
        let fingerprint = file_fingerprint(&entry_path)?;

        if let Some(cached) = self.cache.read().get(&entry_path) {
            if cached.fingerprint == fingerprint {
                return Ok(Arc::clone(&cached.source));
            }
        }

        let source = std::fs::read_to_string(&entry_path)?;
        sandbox::scan_source(&source)?;
        let source = Arc::new(source);
        self.cache.write().insert(
            entry_path,
            CachedSource {
                fingerprint,
                source: Arc::clone(&source),
            },
        );
        Ok(source)
    }
}

/// Canonicalize the declared entry against the plugin's own directory and
/// reject any resolution that escapes it.
fn resolve_entry(plugin_dir: &Path, entry: &str) -> Result<PathBuf> {
    let root = plugin_dir
        .canonicalize()
        .map_err(|e| AssistantError::Plugin(format!("plugin directory unreadable: {}", e)))?;
    let entry_path = root
        .join(entry)
        .canonicalize()
        .map_err(|_| AssistantError::Plugin(format!("entry file '{}' not found", entry)))?;
    if !entry_path.starts_with(&root) {
        return Err(AssistantError::Plugin(format!(
            "entry file '{}' escapes the plugin directory",
            entry
        )));
    }
    Ok(entry_path)
}

fn file_fingerprint(path: &Path) -> Result<Fingerprint> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((mtime, metadata.len()))
}

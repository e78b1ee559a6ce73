//! Application launching consumed by the open-app intent

use crate::core::error::{AssistantError, Result};
use std::collections::HashMap;

pub trait AppLauncher: Send + Sync {
    /// Launch the named application detached from the assistant process
    fn launch(&self, app: &str) -> Result<()>;
}

/// Spawns the aliased executable (or the name verbatim) and detaches
pub struct ProcessLauncher {
    aliases: HashMap<String, String>,
}

impl ProcessLauncher {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    fn resolve(&self, app: &str) -> String {
        self.aliases
            .get(app)
            .cloned()
            .unwrap_or_else(|| app.to_string())
    }
}

impl AppLauncher for ProcessLauncher {
    fn launch(&self, app: &str) -> Result<()> {
        let program = self.resolve(app);
        std::process::Command::new(&program)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| AssistantError::InvalidInput(format!("Cannot launch '{}': {}", program, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        let mut aliases = HashMap::new();
        aliases.insert("browser".to_string(), "firefox".to_string());
        let launcher = ProcessLauncher::new(aliases);
        assert_eq!(launcher.resolve("browser"), "firefox");
        assert_eq!(launcher.resolve("gimp"), "gimp");
    }

    #[test]
    fn test_launch_missing_binary_fails_cleanly() {
        let launcher = ProcessLauncher::new(HashMap::new());
        let result = launcher.launch("definitely-not-a-real-binary-9f2c");
        assert!(result.is_err());
    }
}

//! Sandbox container configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Settings for the local sandbox container and the shells it spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Shell program path. Empty string means auto-detect from `$SHELL`.
    pub program: String,
    /// Extra arguments passed to the shell.
    pub args: Vec<String>,
    /// Container root and shell working directory. `None` means the
    /// platform data directory (`<data_dir>/termbridge/sandbox`).
    pub root: Option<PathBuf>,
    /// Only pass an allowlisted subset of the host environment to shells.
    pub isolate_env: bool,
    /// Extra environment variables injected into every shell.
    pub env: HashMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            root: None,
            isolate_env: true,
            env: HashMap::new(),
        }
    }
}

impl SandboxConfig {
    /// Resolved container root directory.
    pub fn root_dir(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("termbridge")
                .join("sandbox"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_config_defaults() {
        let config = SandboxConfig::default();
        assert!(config.program.is_empty());
        assert!(config.args.is_empty());
        assert!(config.root.is_none());
        assert!(config.isolate_env);
        assert!(config.env.is_empty());
    }

    #[test]
    fn sandbox_config_partial_toml() {
        let toml_str = r#"
program = "/bin/bash"
args = ["--noprofile"]
isolate_env = false

[env]
EDITOR = "vi"
"#;
        let config: SandboxConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.program, "/bin/bash");
        assert_eq!(config.args, vec!["--noprofile"]);
        assert!(!config.isolate_env);
        assert_eq!(config.env.get("EDITOR").unwrap(), "vi");
        assert!(config.root.is_none());
    }

    #[test]
    fn root_dir_prefers_explicit_root() {
        let config = SandboxConfig {
            root: Some(PathBuf::from("/srv/sandbox")),
            ..SandboxConfig::default()
        };
        assert_eq!(config.root_dir(), PathBuf::from("/srv/sandbox"));
    }

    #[test]
    fn root_dir_default_ends_with_sandbox() {
        let dir = SandboxConfig::default().root_dir();
        assert!(dir.ends_with("termbridge/sandbox"));
    }
}

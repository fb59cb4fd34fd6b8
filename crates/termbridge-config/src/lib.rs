//! termbridge configuration system.
//!
//! TOML-based configuration for the remote transport, the sandbox
//! container, the host terminal, logging and the companion server. All
//! sections use serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use termbridge_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use env::{apply_env_overrides, REMOTE_URL_ENV};
pub use schema::{TermbridgeConfig, CONFIG_SCHEMA_VERSION, DEFAULT_REMOTE_URL};

use std::path::Path;

use termbridge_common::ConfigError;

/// Load config from the platform default path, then apply environment
/// overrides.
///
/// Creates a commented default file when none exists. Invalid values are
/// logged as warnings and kept; only unreadable or unparsable files fail.
pub fn load_config() -> Result<TermbridgeConfig, ConfigError> {
    let mut config = toml_loader::load_default()?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Like [`load_config`] but reads an explicit file instead of the default path.
pub fn load_config_from(path: &Path) -> Result<TermbridgeConfig, ConfigError> {
    let mut config = toml_loader::load_from_path(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TermbridgeConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let config = TermbridgeConfig::default();
        let json = config_to_json(&config);
        assert!(json.contains("\"remote\""));
        assert!(json.contains("\"sandbox\""));
        assert!(json.contains("\"terminal\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"server\""));
        assert!(json.contains(DEFAULT_REMOTE_URL));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn load_config_from_keeps_file_with_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[remote]\nurl = \"wss://shell.example.com\"\n\n[terminal]\ncols = 0\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.remote.url, "wss://shell.example.com");
        assert_eq!(config.terminal.cols, 0);
        assert!(validation::validate(&config).is_err());
    }
}

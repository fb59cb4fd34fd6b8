//! Logging and companion server configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Write logs to a file instead of stderr (the CLI owns the terminal).
    pub file_logging: bool,
    /// Log file override. `None` means `<data_dir>/termbridge/termbridge.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file_logging: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Resolved log file path.
    pub fn log_path(&self) -> PathBuf {
        match &self.file {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("termbridge")
                .join("termbridge.log"),
        }
    }
}

/// Companion shell server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4000".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let parsed: LogLevel = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(parsed, LogLevel::Trace);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let result: Result<LoggingConfig, _> = toml::from_str("level = \"verbose\"");
        assert!(result.is_err());
    }

    #[test]
    fn log_path_override() {
        let config = LoggingConfig {
            file: Some(PathBuf::from("/var/log/termbridge.log")),
            ..LoggingConfig::default()
        };
        assert_eq!(config.log_path(), PathBuf::from("/var/log/termbridge.log"));
        assert!(LoggingConfig::default()
            .log_path()
            .ends_with("termbridge/termbridge.log"));
    }

    #[test]
    fn server_config_default_bind() {
        assert_eq!(ServerConfig::default().bind, "127.0.0.1:4000");
    }
}

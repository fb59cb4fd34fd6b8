//! Subscriber setup. The terminal belongs to the bridged session, so logs
//! go to a file unless file logging is turned off.

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use termbridge_config::schema::LoggingConfig;
use tracing_subscriber::EnvFilter;

const FALLBACK_DIRECTIVE: &str = "termbridge=info";

/// Filter directive: the CLI override if given, else the configured level.
pub fn directive(cli_override: Option<&str>, config: &LoggingConfig) -> String {
    match cli_override {
        Some(level) if !level.trim().is_empty() => level.trim().to_string(),
        _ => format!("termbridge={}", config.level),
    }
}

fn filter(directive: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(
        directive
            .parse()
            .unwrap_or_else(|_| FALLBACK_DIRECTIVE.parse().unwrap()),
    )
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig, cli_override: Option<&str>) -> Result<(), String> {
    let directive = directive(cli_override, config);

    if !config.file_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter(&directive))
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let path = config.log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create log directory {}: {e}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(&directive))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use termbridge_config::schema::LogLevel;

    #[test]
    fn cli_override_wins() {
        let config = LoggingConfig::default();
        assert_eq!(directive(Some("debug"), &config), "debug");
        assert_eq!(directive(Some("  "), &config), "termbridge=info");
    }

    #[test]
    fn config_level_is_scoped_to_termbridge() {
        let config = LoggingConfig {
            level: LogLevel::Trace,
            ..LoggingConfig::default()
        };
        assert_eq!(directive(None, &config), "termbridge=trace");
    }

    #[test]
    fn unparseable_directive_falls_back() {
        // Must not panic.
        let _ = filter("==not a directive==");
    }
}

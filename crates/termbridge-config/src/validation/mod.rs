//! Full configuration validation.
//!
//! Each domain has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod misc;
mod remote;
mod terminal;


pub use remote::is_ws_url;

use crate::schema::TermbridgeConfig;
use termbridge_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TermbridgeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    remote::validate_remote(&mut errors, config);
    terminal::validate_terminal(&mut errors, config);
    misc::validate_sandbox(&mut errors, config);
    misc::validate_server(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

//! Environment variable overrides.
//!
//! Exactly one variable is consumed: the remote transport endpoint.

use tracing::{info, warn};

use crate::schema::TermbridgeConfig;
use crate::validation::is_ws_url;

/// Environment variable selecting the remote transport endpoint URL.
pub const REMOTE_URL_ENV: &str = "TERMBRIDGE_REMOTE_URL";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut TermbridgeConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides using an arbitrary lookup (the process env in production).
///
/// An override that fails validation is logged and applied anyway, the same
/// way an invalid file value is.
pub fn apply_overrides_from<F>(config: &mut TermbridgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(REMOTE_URL_ENV) {
        let url = url.trim();
        if !url.is_empty() {
            info!(url = %url, "remote url overridden by {REMOTE_URL_ENV}");
            if !is_ws_url(url) {
                warn!(url = %url, "{REMOTE_URL_ENV} is not a ws:// or wss:// url");
            }
            config.remote.url = url.to_string();
        }
    }
}

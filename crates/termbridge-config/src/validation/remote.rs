use std::sync::LazyLock;

use regex::Regex;

use crate::schema::TermbridgeConfig;

static WS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wss?://[^\s/?#]+").unwrap());

/// Whether `url` is a WebSocket URL with a host part.
pub fn is_ws_url(url: &str) -> bool {
    WS_URL_RE.is_match(url)
}

pub(crate) fn validate_remote(errors: &mut Vec<String>, config: &TermbridgeConfig) {
    if !is_ws_url(&config.remote.url) {
        errors.push(format!(
            "remote.url = {:?} must be a ws:// or wss:// URL",
            config.remote.url
        ));
    }
}

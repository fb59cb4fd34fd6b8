use serde::{Deserialize, Serialize};

/// Endpoint used when neither the config file nor the environment names one.
pub const DEFAULT_REMOTE_URL: &str = "ws://localhost:4000";

/// Remote shell transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// WebSocket URL of the remote shell server.
    pub url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REMOTE_URL.into(),
        }
    }
}

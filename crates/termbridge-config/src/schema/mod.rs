//! Configuration schema types for termbridge.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults matching the built-in behavior.

mod remote;
mod sandbox;
mod system;
mod terminal;

pub use remote::*;
pub use sandbox::*;
pub use system::*;
pub use terminal::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for termbridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermbridgeConfig {
    pub remote: RemoteConfig,
    pub sandbox: SandboxConfig,
    pub terminal: TerminalConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

// =============================================================================
// Tests
// =============================================================================

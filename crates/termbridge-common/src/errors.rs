use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of a terminal surface (the widget side of a bridge).
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface already disposed")]
    Disposed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("surface dispose failed: {0}")]
    Dispose(String),
}

/// Failures of the remote socket transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failures of the sandboxed local runtime.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox boot failed: {0}")]
    Boot(String),

    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("process error: {0}")]
    Process(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("view is already mounted")]
    AlreadyMounted,

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub mod errors;
pub mod id;
pub mod types;

pub use errors::{BridgeError, ConfigError, SandboxError, SurfaceError, TransportError};
pub use id::{new_id, SessionId};
pub use types::{BackendKind, BridgePhase, ConnectionState, TermSize, DEFAULT_COLS, DEFAULT_ROWS};

pub type Result<T> = std::result::Result<T, BridgeError>;

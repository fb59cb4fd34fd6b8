//! Remote session transport: a WebSocket connection to a shell server.

mod backend;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use backend::{write_frames, RemoteBackend};
pub use protocol::ControlMessage;

//! Wire protocol spoken with the shell server.
//!
//! Keystrokes travel as raw frames with no envelope. The only structured
//! message is the resize notification.

use serde::{Deserialize, Serialize};
use termbridge_common::{TermSize, TransportError};

/// Structured client-to-server messages, sent as text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Resize { cols: u16, rows: u16 },
}

impl ControlMessage {
    pub fn resize(size: TermSize) -> Self {
        Self::Resize {
            cols: size.cols,
            rows: size.rows,
        }
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    /// Parse a text frame. `None` means the frame is plain input.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with('{') {
            return None;
        }
        serde_json::from_str(text).ok()
    }
}

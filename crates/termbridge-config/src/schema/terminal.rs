//! Host terminal configuration types.

use serde::{Deserialize, Serialize};

/// Host terminal settings used by the CLI surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Fallback columns when the host size cannot be queried (valid range: 1-1000).
    pub cols: u16,
    /// Fallback rows when the host size cannot be queried (valid range: 1-500).
    pub rows: u16,
    /// Pressing Ctrl plus this character detaches the view.
    pub detach_key: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            detach_key: "]".into(),
        }
    }
}

impl TerminalConfig {
    /// Control byte produced by Ctrl + `detach_key`, if the key has one.
    pub fn detach_byte(&self) -> Option<u8> {
        let mut chars = self.detach_key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let upper = c.to_ascii_uppercase();
        if ('@'..='_').contains(&upper) {
            Some(upper as u8 - b'@')
        } else {
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

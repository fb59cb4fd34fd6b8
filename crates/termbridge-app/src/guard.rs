//! Raw-mode guard for the host terminal.

use crossterm::{cursor, execute, terminal};

/// Puts the host terminal in raw mode and restores it on drop, including
/// during a panic unwind.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Always attempt to restore terminal state, ignoring errors
        let _ = terminal::disable_raw_mode();
        let _ = execute!(std::io::stdout(), cursor::Show);
    }
}

//! User-visible text written into a surface by the bridge itself.

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

pub const CONNECTION_CLOSED: &str = "\r\n\x1b[31mConnection closed.\x1b[0m\r\n";
pub const CONNECTION_ERROR: &str = "\r\n\x1b[31mConnection Error.\x1b[0m\r\n";

pub const BOOTING_SANDBOX: &str = "Booting sandbox...\r\n";
pub const STARTING_SHELL: &str = "Starting shell...\r\n";
pub const SHELL_READY: &str = "Ready.\r\n";

/// An initialization failure, shown in place of the session.
pub fn error(message: &str) -> String {
    format!("\r\n{RED}Error: {}{RESET}\r\n", crlf(message))
}

/// Isolation precondition not met. Multi-line, so it stands out.
pub fn isolation_warning(reason: &str) -> String {
    format!(
        "{YELLOW}Warning: the environment is not isolated.\r\n\
         {}\r\n\
         Continuing anyway.{RESET}\r\n",
        crlf(reason)
    )
}

pub fn process_exited(code: Option<u32>) -> String {
    match code {
        Some(code) => format!("\r\n{YELLOW}Process exited (code {code}).{RESET}\r\n"),
        None => format!("\r\n{YELLOW}Process exited.{RESET}\r\n"),
    }
}

/// Surfaces are in raw mode: a bare `\n` would not return the cursor.
fn crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

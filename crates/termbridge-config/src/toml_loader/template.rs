//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# termbridge configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[remote]
# WebSocket endpoint of the remote shell server.
# The TERMBRIDGE_REMOTE_URL environment variable takes precedence.
# url = "ws://localhost:4000"

[sandbox]
# program = ""           # empty = $SHELL (or $COMSPEC on Windows)
# args = []
# root = "/path/to/sandbox"   # default: <data dir>/termbridge/sandbox
# isolate_env = true     # only pass an allowlisted environment to shells

[sandbox.env]
# EDITOR = "vi"

[terminal]
# cols = 80              # 1-1000, used when the host size is unknown
# rows = 24              # 1-500
# detach_key = "]"       # Ctrl+] detaches the view

[logging]
# level = "info"         # trace, debug, info, warn, error
# file_logging = true
# file = "/path/to/termbridge.log"

[server]
# bind = "127.0.0.1:4000"
"##
    .to_string()
}

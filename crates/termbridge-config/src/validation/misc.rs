use std::net::SocketAddr;

use crate::schema::TermbridgeConfig;

pub(crate) fn validate_sandbox(errors: &mut Vec<String>, config: &TermbridgeConfig) {
    for key in config.sandbox.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            errors.push(format!("sandbox.env has invalid variable name {key:?}"));
        }
    }
}

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &TermbridgeConfig) {
    if config.server.bind.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "server.bind = {:?} is not a socket address",
            config.server.bind
        ));
    }
}

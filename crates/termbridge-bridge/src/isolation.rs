//! Environment precondition checks.
//!
//! A backend asks an injected [`IsolationCheck`] whether its environment is
//! isolated enough before it starts. An unsatisfied check never blocks the
//! start: the bridge writes a diagnostic into the surface, logs it, and
//! carries on in degraded mode.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Outcome of an isolation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    Satisfied,
    /// Not isolated. The reason tells the operator what to change.
    Unsatisfied(String),
}

impl Isolation {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Unsatisfied(reason) => write!(f, "unsatisfied: {reason}"),
        }
    }
}

/// Injected capability check, evaluated once per bridge start.
pub type IsolationCheck = Arc<dyn Fn() -> Isolation + Send + Sync>;

/// A check that always passes.
pub fn always_satisfied() -> IsolationCheck {
    Arc::new(|| Isolation::Satisfied)
}

/// A check that always fails with `reason`.
pub fn always_unsatisfied(reason: impl Into<String>) -> IsolationCheck {
    let reason = reason.into();
    Arc::new(move || Isolation::Unsatisfied(reason.clone()))
}

/// Sandbox check: shells must not inherit the host environment.
pub fn environment_isolation(isolate_env: bool) -> IsolationCheck {
    Arc::new(move || {
        if isolate_env {
            Isolation::Satisfied
        } else {
            Isolation::Unsatisfied(
                "sandbox shells inherit the full host environment. \
                 Set `isolate_env = true` under [sandbox] in config.toml \
                 to restrict it to an allowlist."
                    .into(),
            )
        }
    })
}

/// Remote check: plaintext `ws://` is only acceptable on loopback.
pub fn transport_security(url: &str) -> IsolationCheck {
    let verdict = classify_url(url);
    Arc::new(move || verdict.clone())
}

fn classify_url(url: &str) -> Isolation {
    if url.starts_with("wss://") {
        return Isolation::Satisfied;
    }
    let Some(rest) = url.strip_prefix("ws://") else {
        return Isolation::Unsatisfied(format!("unrecognized endpoint scheme in {url}"));
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host_of(authority);
    if is_loopback(host) {
        Isolation::Satisfied
    } else {
        Isolation::Unsatisfied(format!(
            "{url} is plaintext and not on loopback. \
             Use a wss:// endpoint or set TERMBRIDGE_REMOTE_URL to a local address."
        ))
    }
}

fn host_of(authority: &str) -> &str {
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    if let Some(bracketed) = authority.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or_default();
    }
    authority.split(':').next().unwrap_or_default()
}

fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_isolation_follows_flag() {
        assert!(environment_isolation(true)().is_satisfied());
        match environment_isolation(false)() {
            Isolation::Unsatisfied(reason) => assert!(reason.contains("isolate_env = true")),
            Isolation::Satisfied => panic!("expected unsatisfied"),
        }
    }

    #[test]
    fn loopback_plaintext_is_satisfied() {
        assert!(transport_security("ws://localhost:4000")().is_satisfied());
        assert!(transport_security("ws://127.0.0.1:4000/term")().is_satisfied());
        assert!(transport_security("ws://[::1]:4000")().is_satisfied());
        assert!(transport_security("ws://LOCALHOST")().is_satisfied());
    }

    #[test]
    fn tls_is_satisfied_anywhere() {
        assert!(transport_security("wss://shell.example.com")().is_satisfied());
    }

    #[test]
    fn remote_plaintext_is_unsatisfied() {
        let verdict = transport_security("ws://10.0.0.5:4000")();
        assert!(!verdict.is_satisfied());
        assert!(verdict.to_string().contains("wss://"));

        assert!(!transport_security("ws://user@shell.example.com/x")().is_satisfied());
    }

    #[test]
    fn fixed_checks() {
        assert_eq!(always_satisfied()(), Isolation::Satisfied);
        assert_eq!(
            always_unsatisfied("headers missing")(),
            Isolation::Unsatisfied("headers missing".into())
        );
    }
}

//! Terminal session bridges.
//!
//! A bridge pipes keystrokes from a [`TerminalSurface`] to a backend and
//! pipes backend output back to the surface, forwarding resize events on
//! the way. Two backends exist:
//!
//! - [`remote::RemoteBackend`]: a WebSocket connection to a remote shell server.
//! - [`sandbox::SandboxBackend`]: a shell spawned inside a process-wide
//!   [`sandbox::SandboxService`] container, booted once and shared by all views.
//!
//! [`TerminalView`] owns the lifecycle: mount, wire, and tear down.

pub mod isolation;
pub mod notices;
pub mod remote;
pub mod sandbox;
pub mod session;
pub mod single_flight;
pub mod surface;
pub mod utf8;
pub mod view;

pub use isolation::{Isolation, IsolationCheck};
pub use session::{Session, SessionEnd};
pub use single_flight::{InitError, SharedService};
pub use surface::{HeadlessProbe, HeadlessSurface, SurfaceEvent, SurfaceHandle, TerminalSurface};
pub use utf8::Utf8Decoder;
pub use view::{Backend, BridgeLink, TerminalView};

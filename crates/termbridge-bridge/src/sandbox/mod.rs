//! Sandboxed local runtime: shells spawned inside one shared container.
//!
//! [`SandboxService`] owns the container and boots it at most once,
//! however many views ask for it concurrently. [`SandboxBackend`] spawns
//! one shell per mounted view inside that container.

mod backend;
mod container;
mod pty;
mod service;


pub use backend::SandboxBackend;
pub use container::{
    default_shell, Container, ContainerBooter, ProcessOutput, ShellProcess, SpawnRequest,
};
pub use pty::{PtyBooter, PtyContainer, PtyProcess, PTY_READ_CHUNK};
pub use service::SandboxService;

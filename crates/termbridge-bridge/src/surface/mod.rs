//! Terminal surfaces: the widget side of a bridge.
//!
//! A surface renders text written to it and emits user keystrokes and
//! resize notifications as [`SurfaceEvent`]s. Bridges never hold a surface
//! directly; they go through a [`SurfaceHandle`], which makes disposal
//! single-shot and drops writes that arrive after teardown.

mod handle;
mod headless;

pub use handle::SurfaceHandle;
pub use headless::{HeadlessProbe, HeadlessSurface};

use termbridge_common::{SurfaceError, TermSize};
use tokio::sync::mpsc;

/// Something the user did on the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Raw input bytes, in the order they were typed.
    Input(Vec<u8>),
    /// The visible grid changed size.
    Resize(TermSize),
}

/// A visual terminal emulator a bridge can drive.
pub trait TerminalSurface: Send {
    /// Current grid dimensions.
    fn size(&self) -> TermSize;

    /// Render terminal output (escape sequences included) verbatim.
    fn write(&mut self, data: &str) -> Result<(), SurfaceError>;

    /// Take the event stream. A surface has a single subscriber; later
    /// calls return `None`.
    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<SurfaceEvent>>;

    /// Release the widget's resources.
    fn dispose(&mut self) -> Result<(), SurfaceError>;
}

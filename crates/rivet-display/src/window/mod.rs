//! Window collaborators.
//!
//! The display never creates or pumps windows itself. It talks to a `WindowHost`,
//! which applies video modes to the native window and reports resize and close
//! events once per frame.

mod host;
mod winit_host;

pub use host::{HeadlessWindow, HostEvents, WindowHost};
pub use winit_host::WinitWindowHost;

//! rivet display crate.
//!
//! An immediate-mode rendering device (quads, fans, strips, compiled meshes,
//! textures, lights, materials) layered over an explicit GPU backend. `Display` holds
//! all backend-agnostic logic; `backend::wgpu::WgpuBackend` drives real hardware and
//! `backend::RecordingBackend` records calls for tests and tooling.

pub mod backend;
pub mod device;
pub mod display;
pub mod draw;
pub mod error;
pub mod handle;
pub mod logging;
pub mod math;
pub mod pixel;
pub mod resource;
pub mod state;
pub mod time;
pub mod window;

pub use display::Display;
pub use error::{DisplayError, VideoModeError};

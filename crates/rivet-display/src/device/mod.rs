//! Device bootstrap helpers: preferences, back-buffer negotiation, swapchain creation
//! and display mode enumeration.

mod init;
pub mod modes;
pub mod negotiate;
pub mod swapchain;
mod video_mode;

pub use init::{DisplayInit, PowerPreference};
pub use modes::{DisplayMode, DisplayRect, DisplaySpec, Rational};
pub use negotiate::find_back_buffer_format;
pub use video_mode::{ActualVideoModeParams, VideoModeParams};

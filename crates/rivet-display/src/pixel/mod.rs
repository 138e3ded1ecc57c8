//! Pixel formats, CPU surfaces and the conversions used during texture upload.

pub mod blit;
mod format;
pub mod mips;
mod surface;

pub use format::{FormatSupport, PixelFormat, PixelFormatDesc};
pub use surface::{Palette, Region, Surface};

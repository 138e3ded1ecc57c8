//! Frame pacing.
//!
//! `FrameLimiter` brackets every present: `before_present(rate)` paces the CPU ahead
//! of vsync and `after_present()` measures the present stall, holds the frame to the
//! configured cap and yields a `FrameTime` snapshot.

mod frame_limiter;

pub use frame_limiter::{FrameLimiter, FrameTime};

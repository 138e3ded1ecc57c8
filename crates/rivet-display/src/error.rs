use thiserror::Error;

use crate::backend::BackendError;
use crate::pixel::{PixelFormat, Region};

/// Errors surfaced by the display layer.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("unsupported back buffer depth: {0} bpp (expected 16 or 32)")]
    UnsupportedFormat(u32),

    #[error("no supported back buffer format for {bpp} bpp")]
    NoBackBufferFormat { bpp: u32 },

    #[error("Swapchain creation failed: {0}")]
    SwapChain(BackendError),

    #[error("window host rejected the video mode: {0}")]
    WindowHost(String),

    #[error("display is not ready; set a video mode first")]
    NotReady,

    #[error("device lost: {0}")]
    DeviceLost(String),

    #[error("stale or unknown {kind} handle")]
    InvalidHandle { kind: &'static str },

    #[error("texture format {0:?} is not supported by this device")]
    UnsupportedTextureFormat(PixelFormat),

    #[error("cannot convert pixels from {from:?} to {to:?}")]
    UnsupportedConversion { from: PixelFormat, to: PixelFormat },

    #[error("update region {region:?} exceeds texture bounds {width}x{height}")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("draw of {count} vertices exceeds the 16-bit index range")]
    TooManyVertices { count: usize },

    #[error("invalid {kind} value: {value}")]
    InvalidEnum { kind: &'static str, value: i32 },

    #[error("mesh index {index} out of range ({count} meshes)")]
    MeshOutOfRange { index: usize, count: usize },

    #[error("mesh {mesh}: vertex index {index} out of range ({vertex_count} vertices)")]
    VertexIndexOutOfRange {
        mesh: usize,
        index: u16,
        vertex_count: usize,
    },

    #[error("mesh set changed shape; allocate before change")]
    GeometryLayoutChanged,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Every attempt `set_video_mode` made, in order, with the reason each failed.
#[derive(Debug, Error)]
#[error("{}", .attempts.join("; "))]
pub struct VideoModeError {
    pub attempts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_mode_error_joins_attempts() {
        let err = VideoModeError {
            attempts: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "first; second");
    }

    #[test]
    fn swapchain_error_keeps_legacy_prefix() {
        let err = DisplayError::SwapChain(BackendError::Unsupported("flip".into()));
        assert!(err.to_string().starts_with("Swapchain creation failed"));
    }
}

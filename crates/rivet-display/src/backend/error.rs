use thiserror::Error;

/// Failures reported by a `GpuBackend`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// The presentation surface must be reconfigured before the next frame.
    #[error("presentation surface lost")]
    SurfaceLost,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("no swapchain has been created")]
    NoSwapChain,

    #[error("{0}")]
    Other(String),
}

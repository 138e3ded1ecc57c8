use crate::backend::SwapEffect;
use crate::pixel::PixelFormat;

/// Requested video mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoModeParams {
    pub windowed: bool,
    pub width: u32,
    pub height: u32,
    /// 16 or 32.
    pub bpp: u32,
    /// Refresh rate in Hz; `0` lets the output choose.
    pub rate: u32,
    /// `None` uses `DisplayInit::vsync`.
    pub vsync: Option<bool>,
    pub title: String,
}

impl Default for VideoModeParams {
    fn default() -> Self {
        Self {
            windowed: true,
            width: 640,
            height: 480,
            bpp: 32,
            rate: 60,
            vsync: None,
            title: "rivet".to_string(),
        }
    }
}

/// What a successful mode set actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualVideoModeParams {
    pub params: VideoModeParams,
    pub format: PixelFormat,
    /// Back-buffer extent, which may differ from the request after a resize.
    pub width: u32,
    pub height: u32,
    pub effect: SwapEffect,
    pub vsync: bool,
    pub tearing: bool,
}

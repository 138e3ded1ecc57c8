use crate::pixel::PixelFormat;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM).
    Fatal,
}

/// Surface formats that present `format`, linear first.
fn candidates(format: PixelFormat) -> &'static [wgpu::TextureFormat] {
    match format {
        PixelFormat::Rgba8 => &[
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ],
        PixelFormat::Bgra8 | PixelFormat::Bgrx8 => &[
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ],
        _ => &[],
    }
}

/// Picks the surface format that presents `format`.
///
/// Blending and colour arithmetic happen in display space, so non-sRGB formats win.
pub(super) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    format: PixelFormat,
) -> Option<wgpu::TextureFormat> {
    candidates(format)
        .iter()
        .copied()
        .find(|f| caps.formats.contains(f))
}

pub(super) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    [wgpu::CompositeAlphaMode::Opaque, wgpu::CompositeAlphaMode::Auto]
        .into_iter()
        .find(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Vsync presents on vblank; otherwise tear if allowed, else let the platform pick a
/// non-blocking mode.
pub(super) fn choose_present_mode(
    caps: &wgpu::SurfaceCapabilities,
    vsync: bool,
    allow_tearing: bool,
) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::Fifo
    } else if allow_tearing && caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
        wgpu::PresentMode::Immediate
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

pub(super) fn classify_surface_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

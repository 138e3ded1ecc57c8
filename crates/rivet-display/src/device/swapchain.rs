use crate::backend::{GpuBackend, SwapChainDesc, SwapEffect};
use crate::error::DisplayError;
use crate::pixel::PixelFormat;

use super::{DisplayInit, VideoModeParams};

/// Swap effects tried in order.
pub const SWAP_EFFECTS: [SwapEffect; 2] = [SwapEffect::FlipDiscard, SwapEffect::Discard];

pub fn swapchain_desc(
    params: &VideoModeParams,
    format: PixelFormat,
    init: &DisplayInit,
    tearing: bool,
) -> SwapChainDesc {
    let vsync = params.vsync.unwrap_or(init.vsync);
    SwapChainDesc {
        width: params.width,
        height: params.height,
        format,
        buffer_count: init.desired_maximum_frame_latency.max(1),
        effect: SWAP_EFFECTS[0],
        allow_tearing: tearing && !vsync,
        vsync,
        windowed: params.windowed,
        refresh_rate: params.rate,
    }
}

/// Creates the swapchain with the flip model, retrying once with the legacy discard
/// model. Returns the effect that succeeded.
pub fn create_swapchain<B: GpuBackend + ?Sized>(
    backend: &mut B,
    desc: &SwapChainDesc,
) -> Result<SwapEffect, DisplayError> {
    let mut last = None;
    for effect in SWAP_EFFECTS {
        let attempt = SwapChainDesc {
            effect,
            ..desc.clone()
        };
        match backend.create_swapchain(&attempt) {
            Ok(()) => {
                log::info!(
                    "swapchain: {}x{} {:?}, {effect:?}, {} buffers",
                    attempt.width,
                    attempt.height,
                    attempt.format,
                    attempt.buffer_count
                );
                return Ok(effect);
            }
            Err(e) => {
                log::warn!("swapchain creation with {effect:?} failed: {e}");
                last = Some(e);
            }
        }
    }
    Err(DisplayError::SwapChain(last.unwrap_or_else(|| {
        crate::backend::BackendError::Other("no swap effect attempted".into())
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, RecordingBackend};

    fn desc() -> SwapChainDesc {
        swapchain_desc(
            &VideoModeParams::default(),
            PixelFormat::Rgba8,
            &DisplayInit::default(),
            false,
        )
    }

    fn effects(backend: &RecordingBackend) -> Vec<SwapEffect> {
        backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::CreateSwapChain(d) => Some(d.effect),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn flip_model_first() {
        let mut backend = RecordingBackend::new();
        assert_eq!(create_swapchain(&mut backend, &desc()).unwrap(), SwapEffect::FlipDiscard);
        assert_eq!(effects(&backend), vec![SwapEffect::FlipDiscard]);
    }

    #[test]
    fn falls_back_to_discard_once() {
        let mut backend = RecordingBackend::new();
        backend.failing_effects.insert(SwapEffect::FlipDiscard);
        assert_eq!(create_swapchain(&mut backend, &desc()).unwrap(), SwapEffect::Discard);
        assert_eq!(effects(&backend), vec![SwapEffect::FlipDiscard, SwapEffect::Discard]);
    }

    #[test]
    fn both_failing_is_terminal() {
        let mut backend = RecordingBackend::new();
        backend.failing_effects.insert(SwapEffect::FlipDiscard);
        backend.failing_effects.insert(SwapEffect::Discard);
        let err = create_swapchain(&mut backend, &desc()).unwrap_err();
        assert!(err.to_string().starts_with("Swapchain creation failed"));
        assert_eq!(effects(&backend).len(), 2);
    }

    #[test]
    fn tearing_only_without_vsync() {
        let params = VideoModeParams {
            vsync: Some(false),
            ..Default::default()
        };
        let d = swapchain_desc(&params, PixelFormat::Bgra8, &DisplayInit::default(), true);
        assert!(d.allow_tearing);
        let d = swapchain_desc(&VideoModeParams::default(), PixelFormat::Bgra8, &DisplayInit::default(), true);
        assert!(!d.allow_tearing);
        assert!(d.vsync);
    }
}

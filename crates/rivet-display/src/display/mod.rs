//! The rendering device: immediate-mode drawing over a `GpuBackend`.
//!
//! `Display` owns the backend, the window host and every piece of CPU-side
//! bookkeeping (state cache, texture and geometry registries, index scratch buffers).
//! One instance is driven from one thread:
//!
//! ```text
//! loop {
//!     if display.begin_frame()? {
//!         display.set_blend_mode(..); display.draw_quads(&verts)?; ...
//!     }
//!     display.end_frame()?;
//! }
//! ```

mod draw;
mod frame;
mod resources;
mod state;

#[cfg(test)]
mod tests;

use crate::backend::{AdapterInfo, BackendError, GpuBackend};
use crate::device::{
    ActualVideoModeParams, DisplayInit, DisplaySpec, VideoModeParams, find_back_buffer_format,
    modes, swapchain,
};
use crate::draw::{DrawStats, IndexPatterns};
use crate::error::{DisplayError, VideoModeError};
use crate::handle::{GeometryKind, Registry, TextureHandle};
use crate::resource::{CompiledGeometry, TextureManager};
use crate::state::{MAX_TEXTURE_UNITS, StateCache};
use crate::time::{FrameLimiter, FrameTime};
use crate::window::WindowHost;

pub struct Display<B: GpuBackend, W: WindowHost> {
    backend: B,
    host: W,
    init: DisplayInit,

    state: StateCache,
    textures: TextureManager,
    geometry: Registry<GeometryKind, CompiledGeometry>,
    patterns: IndexPatterns,

    limiter: FrameLimiter,
    last_frame: Option<FrameTime>,
    stats: DrawStats,

    actual: Option<ActualVideoModeParams>,
    tearing: bool,
    ready: bool,
    device_lost: Option<String>,
    in_frame: bool,
    pending_resize: Option<(u32, u32)>,
    close_requested: bool,
    render_target: TextureHandle,
}

impl<B: GpuBackend, W: WindowHost> Display<B, W> {
    /// Wraps a backend without setting a video mode. The display is not ready until
    /// `set_video_mode` or `try_video_mode` succeeds.
    pub fn new(backend: B, host: W, init: DisplayInit) -> Self {
        let info = backend.adapter_info();
        log::info!(
            "adapter: {} (vendor {:#06x}, device {:#06x}) backend={} driver={}",
            info.name,
            info.vendor,
            info.device,
            info.backend,
            info.driver
        );

        let tearing = backend.supports_tearing();
        log::debug!("tearing supported: {tearing}");

        let textures = TextureManager::new(backend.palette_slots());
        let limiter = FrameLimiter::new(init.frame_limit).with_vsync_lead(init.vsync_lead);

        Self {
            backend,
            host,
            init,
            state: StateCache::new(),
            textures,
            geometry: Registry::new(),
            patterns: IndexPatterns::new(),
            limiter,
            last_frame: None,
            stats: DrawStats::default(),
            actual: None,
            tearing,
            ready: false,
            device_lost: None,
            in_frame: false,
            pending_resize: None,
            close_requested: false,
            render_target: TextureHandle::NONE,
        }
    }

    /// Creates the display and sets the first video mode.
    pub fn init(backend: B, host: W, init: DisplayInit, params: &VideoModeParams) -> Result<Self, VideoModeError> {
        let mut display = Self::new(backend, host, init);
        display.set_video_mode(params)?;
        Ok(display)
    }

    // ── video mode ────────────────────────────────────────────────────────

    /// Sets `params`, falling back to 16 bpp, then 32 bpp, then 640x480 windowed.
    /// On total failure every attempt's reason is returned.
    pub fn set_video_mode(&mut self, params: &VideoModeParams) -> Result<(), VideoModeError> {
        let candidates = [
            params.clone(),
            VideoModeParams {
                bpp: 16,
                ..params.clone()
            },
            VideoModeParams {
                bpp: 32,
                ..params.clone()
            },
            VideoModeParams {
                windowed: true,
                width: 640,
                height: 480,
                ..params.clone()
            },
        ];

        let mut attempts = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            if candidates[..i].contains(candidate) {
                continue;
            }
            match self.try_video_mode(candidate) {
                Ok(()) => {
                    if i > 0 {
                        log::warn!("video mode fell back to {}", describe(candidate));
                    }
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("video mode {} failed: {e}", describe(candidate));
                    attempts.push(format!("{}: {e}", describe(candidate)));
                }
            }
        }
        Err(VideoModeError { attempts })
    }

    /// Negotiates a back-buffer format, applies the mode to the window and rebuilds
    /// the swapchain and its targets.
    pub fn try_video_mode(&mut self, params: &VideoModeParams) -> Result<(), DisplayError> {
        self.ready = false;

        let backend = &self.backend;
        let format = find_back_buffer_format(params.bpp, |f| backend.format_support(f))?
            .ok_or(DisplayError::NoBackBufferFormat { bpp: params.bpp })?;

        self.host
            .apply_video_mode(params)
            .map_err(DisplayError::WindowHost)?;

        let desc = swapchain::swapchain_desc(params, format, &self.init, self.tearing);
        let effect = swapchain::create_swapchain(&mut self.backend, &desc)?;

        self.actual = Some(ActualVideoModeParams {
            params: params.clone(),
            format,
            width: desc.width,
            height: desc.height,
            effect,
            vsync: desc.vsync,
            tearing: desc.allow_tearing,
        });
        self.pending_resize = None;
        self.device_lost = None;
        self.limiter.reset();

        self.resolution_changed()
    }

    /// Rebuilds the back-buffer colour and depth targets at the swapchain's size.
    /// On failure the display stays not ready.
    pub fn resolution_changed(&mut self) -> Result<(), DisplayError> {
        self.ready = false;
        let (width, height) = self.backend.create_back_buffer_targets().map_err(|e| {
            log::error!("creating back buffer targets failed: {e}");
            DisplayError::from(e)
        })?;

        if let Some(actual) = self.actual.as_mut() {
            actual.width = width;
            actual.height = height;
        }
        self.state.invalidate();
        self.render_target = TextureHandle::NONE;
        self.ready = true;
        log::info!("back buffer {width}x{height}");
        Ok(())
    }

    pub fn actual_video_mode(&self) -> Option<&ActualVideoModeParams> {
        self.actual.as_ref()
    }

    pub fn display_specs(&self) -> Vec<DisplaySpec> {
        modes::enumerate(&self.backend.outputs())
    }

    // ── capabilities ──────────────────────────────────────────────────────

    pub fn adapter_info(&self) -> AdapterInfo {
        self.backend.adapter_info()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.is_some()
    }

    pub fn supports_tearing(&self) -> bool {
        self.tearing
    }

    pub fn supports_texture_format(&self, format: crate::pixel::PixelFormat) -> bool {
        self.textures.supports_format(&self.backend, format)
    }

    /// Reported only; all submission happens on the calling thread.
    pub fn supports_threaded_rendering(&self) -> bool {
        true
    }

    pub fn supports_per_vertex_matrix_scale(&self) -> bool {
        false
    }

    pub fn max_texture_units(&self) -> usize {
        MAX_TEXTURE_UNITS
    }

    pub fn max_texture_size(&self) -> u32 {
        self.backend.max_texture_size()
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn host(&self) -> &W {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut W {
        &mut self.host
    }

    /// Counters for the frame in progress, or the last one after `end_frame`.
    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    pub fn last_frame_time(&self) -> Option<FrameTime> {
        self.last_frame
    }

    /// True once the window host reported a close request.
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    fn mark_device_lost(&mut self, reason: String) -> DisplayError {
        log::error!("device lost: {reason}");
        self.ready = false;
        self.in_frame = false;
        self.device_lost = Some(reason.clone());
        DisplayError::DeviceLost(reason)
    }

    fn backend_failure(&mut self, err: BackendError) -> DisplayError {
        match err {
            BackendError::DeviceLost(reason) => self.mark_device_lost(reason),
            other => other.into(),
        }
    }
}

impl<B: GpuBackend, W: WindowHost> Drop for Display<B, W> {
    fn drop(&mut self) {
        let geometry = self.geometry.drain();
        for g in geometry {
            g.release(&mut self.backend);
        }
        self.textures.release_all(&mut self.backend);
        if self.actual.is_some() {
            self.backend.release_swapchain();
        }
        self.host.shutdown();
    }
}

fn describe(params: &VideoModeParams) -> String {
    format!(
        "{}x{} {} bpp {}",
        params.width,
        params.height,
        params.bpp,
        if params.windowed { "windowed" } else { "fullscreen" }
    )
}

use super::Display;
use crate::backend::{BackendError, GpuBackend, RenderTarget};
use crate::draw::DrawStats;
use crate::error::DisplayError;
use crate::handle::TextureHandle;
use crate::pixel::Surface;
use crate::window::WindowHost;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const CLEAR_DEPTH: f32 = 1.0;

impl<B: GpuBackend, W: WindowHost> Display<B, W> {
    /// Pumps the window host, applies a pending resize, then clears and binds the
    /// back buffer.
    ///
    /// `Ok(false)` means this frame should be skipped (minimized window or a surface
    /// that had to be reconfigured). Draws are dropped until the next `true`, and
    /// `end_frame` still has to be called to pace the skipped frame.
    pub fn begin_frame(&mut self) -> Result<bool, DisplayError> {
        let events = self.host.update();
        if let Some(size) = events.resized {
            self.pending_resize = Some(size);
        }
        if events.close_requested {
            self.close_requested = true;
        }

        if let Some(reason) = &self.device_lost {
            return Err(DisplayError::DeviceLost(reason.clone()));
        }
        if self.actual.is_none() {
            return Err(DisplayError::NotReady);
        }

        if let Some((width, height)) = self.pending_resize {
            if width == 0 || height == 0 {
                log::trace!("window minimized; skipping frame");
                return Ok(false);
            }
            self.pending_resize = None;
            log::debug!("resizing swapchain to {width}x{height}");
            self.backend
                .resize_swapchain(width, height)
                .map_err(|e| self.backend_failure(e))?;
            self.resolution_changed()?;
        }
        if !self.ready {
            return Err(DisplayError::NotReady);
        }

        match self.backend.begin_frame() {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => return Err(self.backend_failure(e)),
        }

        self.in_frame = true;
        self.stats = DrawStats::default();
        self.render_target = TextureHandle::NONE;
        self.backend.set_render_target(RenderTarget::BackBuffer);
        self.backend.clear(Some(CLEAR_COLOR), Some(CLEAR_DEPTH));
        Ok(true)
    }

    /// Presents the frame between the two frame-limiter calls.
    ///
    /// Call this after every `begin_frame` that returned `Ok`, including skipped
    /// frames: those present nothing but are still paced.
    pub fn end_frame(&mut self) -> Result<(), DisplayError> {
        let refresh_rate = self.actual.as_ref().map_or(0, |a| a.params.rate);
        if !self.in_frame {
            log::trace!("end_frame without an active frame; pacing only");
            self.limiter.before_present(refresh_rate);
            self.limiter.after_skipped();
            return Ok(());
        }
        self.in_frame = false;

        let sync_interval = match &self.actual {
            Some(actual) if actual.vsync => 1,
            _ => 0,
        };

        self.limiter.before_present(refresh_rate);
        let presented = self.backend.present(sync_interval);
        self.last_frame = Some(self.limiter.after_present());

        match presented {
            Ok(()) => Ok(()),
            Err(BackendError::SurfaceLost) => {
                log::warn!("surface lost during present; reconfiguring next frame");
                if let Some(actual) = &self.actual {
                    self.pending_resize = Some((actual.width, actual.height));
                }
                Ok(())
            }
            Err(e) => Err(self.backend_failure(e)),
        }
    }

    /// Copies the back buffer as drawn so far in the current frame.
    ///
    /// `Ok(None)` outside a frame, or when the back buffer's format cannot be read.
    pub fn create_screenshot(&mut self) -> Result<Option<Surface>, DisplayError> {
        if !(self.ready && self.in_frame) {
            log::debug!("screenshot requested outside a frame");
            return Ok(None);
        }
        let read = self
            .backend
            .read_back_buffer()
            .map_err(|e| self.backend_failure(e))?;
        Ok(read.map(|r| Surface::from_pixels(r.width, r.height, r.format, r.pixels)))
    }
}

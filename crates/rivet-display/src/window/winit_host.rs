use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::{Fullscreen, Window};

use super::{HostEvents, WindowHost};
use crate::device::VideoModeParams;

/// `WindowHost` over a winit window.
///
/// winit delivers events to the application's `ApplicationHandler`, so the application
/// forwards them through `handle_event`; the display drains them in `update`.
pub struct WinitWindowHost {
    window: Arc<Window>,
    pending: HostEvents,
}

impl WinitWindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            pending: HostEvents::default(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Records the events the display cares about.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.pending.resized = Some((size.width, size.height));
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.pending.resized = Some(self.size());
            }
            WindowEvent::CloseRequested => self.pending.close_requested = true,
            _ => {}
        }
    }
}

impl WindowHost for WinitWindowHost {
    fn apply_video_mode(&mut self, params: &VideoModeParams) -> Result<(), String> {
        if params.width == 0 || params.height == 0 {
            return Err(format!("invalid window size {}x{}", params.width, params.height));
        }

        self.window.set_title(&params.title);

        if params.windowed {
            self.window.set_fullscreen(None);
        } else {
            let monitor = self.window.current_monitor();
            if monitor.is_none() {
                return Err("no monitor available for fullscreen".to_string());
            }
            self.window.set_fullscreen(Some(Fullscreen::Borderless(monitor)));
        }

        // `Some` means the size was applied synchronously; otherwise a `Resized` event follows.
        if let Some(size) = self
            .window
            .request_inner_size(PhysicalSize::new(params.width, params.height))
        {
            log::debug!("window resized to {}x{}", size.width, size.height);
        }
        self.window.request_redraw();
        Ok(())
    }

    fn update(&mut self) -> HostEvents {
        self.window.request_redraw();
        std::mem::take(&mut self.pending)
    }

    fn shutdown(&mut self) {
        if self.window.fullscreen().is_some() {
            self.window.set_fullscreen(None);
        }
    }
}

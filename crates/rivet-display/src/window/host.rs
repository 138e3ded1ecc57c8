use crate::device::VideoModeParams;

/// Events collected since the previous `WindowHost::update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEvents {
    /// Latest client size if the window was resized.
    pub resized: Option<(u32, u32)>,
    pub close_requested: bool,
}

/// Native window provider driven by the display.
pub trait WindowHost {
    /// Resizes/retitles the window and switches between windowed and fullscreen.
    /// The error string is reported back through the video-mode failure chain.
    fn apply_video_mode(&mut self, params: &VideoModeParams) -> Result<(), String>;

    /// Services pending window events. Called once at the start of every frame.
    fn update(&mut self) -> HostEvents;

    /// Leaves fullscreen and releases the window.
    fn shutdown(&mut self) {}
}

/// Window host without a native window. Used by tests and tooling.
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    /// Every mode passed to `apply_video_mode`, successful or not.
    pub applied: Vec<VideoModeParams>,
    /// Modes matching this predicate are rejected.
    pub reject: Option<fn(&VideoModeParams) -> bool>,
    /// Events returned by the next `update`.
    pub pending: HostEvents,
    pub updates: u32,
    pub shut_down: bool,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a resize for the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending.resized = Some((width, height));
    }
}

impl WindowHost for HeadlessWindow {
    fn apply_video_mode(&mut self, params: &VideoModeParams) -> Result<(), String> {
        self.applied.push(params.clone());
        match self.reject {
            Some(reject) if reject(params) => Err(format!(
                "{}x{} {} bpp rejected by window host",
                params.width, params.height, params.bpp
            )),
            _ => Ok(()),
        }
    }

    fn update(&mut self) -> HostEvents {
        self.updates += 1;
        std::mem::take(&mut self.pending)
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_drains_pending_events() {
        let mut host = HeadlessWindow::new();
        host.resize(800, 600);
        assert_eq!(host.update().resized, Some((800, 600)));
        assert_eq!(host.update(), HostEvents::default());
        assert_eq!(host.updates, 2);
    }

    #[test]
    fn rejected_modes_are_still_recorded() {
        let mut host = HeadlessWindow {
            reject: Some(|p| !p.windowed),
            ..Default::default()
        };
        let fullscreen = VideoModeParams {
            windowed: false,
            ..Default::default()
        };
        assert!(host.apply_video_mode(&fullscreen).is_err());
        assert!(host.apply_video_mode(&VideoModeParams::default()).is_ok());
        assert_eq!(host.applied.len(), 2);
    }
}

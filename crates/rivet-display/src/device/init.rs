/// Device-level preferences applied when a `Display` is created.
///
/// Keep this structure small. Per-mode settings live in `VideoModeParams`.
#[derive(Debug, Clone)]
pub struct DisplayInit {
    /// Enables backend validation layers and debug labels.
    ///
    /// Checked at runtime so release builds can still turn it on.
    pub debug_validation: bool,

    /// Default vsync for modes that do not override it.
    pub vsync: bool,

    /// Optional CPU-side frame cap in frames per second.
    pub frame_limit: Option<u32>,

    /// Fraction of each refresh interval to sleep before present; `0.0` disables it.
    pub vsync_lead: f32,

    /// Adapter selection preference. Falls back to any adapter if unmet.
    pub power_preference: PowerPreference,

    /// Desired number of frames queued ahead of presentation.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

impl Default for DisplayInit {
    fn default() -> Self {
        Self {
            debug_validation: false,
            vsync: true,
            frame_limit: None,
            vsync_lead: 0.0,
            power_preference: PowerPreference::HighPerformance,
            desired_maximum_frame_latency: 2,
        }
    }
}

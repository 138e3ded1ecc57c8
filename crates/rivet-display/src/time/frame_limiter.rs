use std::time::{Duration, Instant};

/// Frame timing snapshot produced after each present.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous present, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken after present returned.
    pub now: Instant,

    /// Time spent blocked inside present (vsync or compositor).
    pub present_stall: Duration,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Paces presents in two halves.
///
/// Ahead of present, an optional lead fraction sleeps through part of the time left
/// in the current refresh interval so input is sampled closer to vsync. After
/// present, the optional fps cap sleeps until a full frame interval has passed
/// since the previous frame ended, which also absorbs compositor stalls.
///
/// Delta time is clamped to avoid pathological values after a debugger pause or a
/// minimized window.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    frame_interval: Option<Duration>,
    vsync_lead: f32,
    last: Instant,
    present_started: Option<Instant>,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

/// Minimum pause for a frame that never reached present.
const SKIPPED_FRAME_PAUSE: Duration = Duration::from_millis(10);

impl FrameLimiter {
    /// `max_fps` of `None` or `Some(0)` disables the cap.
    pub fn new(max_fps: Option<u32>) -> Self {
        Self {
            frame_interval: max_fps
                .filter(|&fps| fps > 0)
                .map(|fps| Duration::from_secs_f64(1.0 / fps as f64)),
            vsync_lead: 0.0,
            last: Instant::now(),
            present_started: None,
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    /// Fraction of the remaining refresh interval slept before present.
    /// Clamped to `0.0..=1.0`; `0.0` disables the lead.
    pub fn with_vsync_lead(mut self, fraction: f32) -> Self {
        self.vsync_lead = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resets the baseline, e.g. after a mode change.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.present_started = None;
    }

    /// How long the fps cap still holds the frame at `now`.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let deadline = self.last + self.frame_interval?;
        let wait = deadline.saturating_duration_since(now);
        (!wait.is_zero()).then_some(wait)
    }

    /// How long to sleep at `now` before presenting on a `refresh_rate` Hz output.
    pub fn vsync_wait(&self, now: Instant, refresh_rate: u32) -> Option<Duration> {
        if self.vsync_lead <= 0.0 || refresh_rate == 0 {
            return None;
        }
        let refresh = Duration::from_secs_f64(1.0 / refresh_rate as f64);
        let spent = now.saturating_duration_since(self.last);
        let wait = refresh.saturating_sub(spent).mul_f64(self.vsync_lead as f64);
        (!wait.is_zero()).then_some(wait)
    }

    /// Sleeps through the vsync lead, then marks the start of present.
    pub fn before_present(&mut self, refresh_rate: u32) {
        if let Some(wait) = self.vsync_wait(Instant::now(), refresh_rate) {
            std::thread::sleep(wait);
        }
        self.present_started = Some(Instant::now());
    }

    /// Records the present stall, enforces the fps cap and advances the frame.
    pub fn after_present(&mut self) -> FrameTime {
        let presented = Instant::now();
        let present_stall = self
            .present_started
            .take()
            .map(|start| presented.saturating_duration_since(start))
            .unwrap_or_default();
        if present_stall > self.dt_max {
            log::debug!("present stalled for {present_stall:?}");
        }

        if let Some(wait) = self.remaining(presented) {
            std::thread::sleep(wait);
        }
        let now = Instant::now();

        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            present_stall,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }

    /// Paces a frame that was skipped before present. Sleeps for the fps cap, but
    /// never less than a short pause, so a minimized window does not spin.
    pub fn after_skipped(&mut self) {
        self.present_started = None;
        let now = Instant::now();
        let wait = self
            .remaining(now)
            .unwrap_or_default()
            .max(SKIPPED_FRAME_PAUSE);
        std::thread::sleep(wait);
        self.last = Instant::now();
    }
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}

//! Wall-clock-driven frame scheduling.
//!
//! The clock converts real elapsed time into a target frame index. The render
//! loop polls [`PlaybackClock::should_rerender`] in a tight cycle and only
//! decodes and draws when the index changes; [`PlaybackClock::complete_frame`]
//! paces the loop and is its only suspension point.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use crate::subtitle::SubtitleWindow;

/// Sleeps shorter than this are skipped; coarse timers tend to oversleep them.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Source of monotonic time and blocking sleeps.
pub trait TimeSource {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real time, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Manually driven time for deterministic replays and tests.
///
/// `sleep` advances the clock instantly; `advance` simulates work.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate `duration` of work.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Total time spent in `sleep`.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.set(self.slept.get() + duration);
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Lifecycle of a playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No frame has been time-stamped yet.
    Priming,
    Playing,
    /// Elapsed time reached the stream duration.
    Ended,
}

/// Frame scheduler for one playback session.
pub struct PlaybackClock<T: TimeSource> {
    time: T,
    state: ClockState,
    fps: f64,
    frame_interval: Duration,
    total_frames: u64,
    /// Total stream duration in seconds.
    duration: f64,
    /// Real time played so far.
    elapsed: Duration,
    /// When `elapsed` was last brought up to date.
    last_tick: Option<Duration>,
    last_rendered: Option<u64>,
    /// Start of the current frame's on-screen interval.
    t0: Option<Duration>,
    rendered_since_complete: bool,
    fps_frames: u32,
    fps_timer: Duration,
    measured_fps: Option<u32>,
    last_frame_delta: f64,
    subtitles: Option<SubtitleWindow>,
}

impl<T: TimeSource> PlaybackClock<T> {
    /// Create a clock playing `total_frames` at `fps`.
    ///
    /// A non-positive `fps` falls back to 30.
    pub fn new(time: T, fps: f64, total_frames: u64) -> Self {
        let fps = if fps > 0.0 { fps } else { 30.0 };
        Self {
            time,
            state: ClockState::Priming,
            fps,
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            total_frames,
            duration: total_frames as f64 / fps,
            elapsed: Duration::ZERO,
            last_tick: None,
            last_rendered: None,
            t0: None,
            rendered_since_complete: false,
            fps_frames: 0,
            fps_timer: Duration::ZERO,
            measured_fps: None,
            last_frame_delta: 0.0,
            subtitles: None,
        }
    }

    /// Attach a subtitle window driven by this clock.
    ///
    /// The window is aligned to the clock's rate so that later rate changes
    /// re-time its cues along with elapsed time.
    pub fn with_subtitles(mut self, mut window: SubtitleWindow) -> Self {
        window.align_to(self.fps);
        self.subtitles = Some(window);
        self
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration
    }

    /// Current time of the underlying time source.
    pub fn now(&self) -> Duration {
        self.time.now()
    }

    /// Frames completed during the last full second, once one has passed.
    pub fn measured_fps(&self) -> Option<u32> {
        self.measured_fps
    }

    /// Seconds the last frame ran over (positive) or under (negative) its
    /// interval, before pacing.
    pub fn last_frame_delta(&self) -> f64 {
        self.last_frame_delta
    }

    pub fn last_rendered_frame(&self) -> Option<u64> {
        self.last_rendered
    }

    pub fn subtitles(&self) -> Option<&SubtitleWindow> {
        self.subtitles.as_ref()
    }

    pub fn subtitles_mut(&mut self) -> Option<&mut SubtitleWindow> {
        self.subtitles.as_mut()
    }

    pub fn time_to_frame_index(&self, elapsed_secs: f64) -> u64 {
        (elapsed_secs.max(0.0) * self.fps).round() as u64
    }

    /// Frame index that should be on screen now.
    pub fn current_frame_index(&self) -> u64 {
        self.time_to_frame_index(self.elapsed_secs())
    }

    pub fn should_rerender(&self) -> bool {
        self.last_rendered != Some(self.current_frame_index())
    }

    pub fn should_end(&self) -> bool {
        self.elapsed_secs() >= self.duration
    }

    /// Record that the current frame index is going on screen.
    ///
    /// Starts the frame's on-screen interval and advances the subtitle
    /// window. Returns the frame index.
    pub fn mark_rendered(&mut self) -> u64 {
        let frame = self.current_frame_index();
        let now = self.time.now();

        self.t0 = Some(now);
        self.last_rendered = Some(frame);
        self.rendered_since_complete = true;
        if self.state == ClockState::Priming {
            self.state = ClockState::Playing;
            self.last_tick = Some(now);
        }

        let elapsed_ms = self.elapsed_secs() * 1000.0;
        if let Some(subs) = self.subtitles.as_mut() {
            subs.update(elapsed_ms);
        }

        frame
    }

    /// Finish one loop iteration that ended at `now`.
    ///
    /// Sleeps out the remainder of the frame interval (if at least 1ms) and
    /// then advances elapsed time by the real wall time that passed, so
    /// timing errors never accumulate.
    pub fn complete_frame(&mut self, now: Duration) {
        let Some(t0) = self.t0 else {
            return;
        };

        let raw_delta = now.saturating_sub(t0);
        if self.rendered_since_complete {
            self.last_frame_delta = raw_delta.as_secs_f64() - self.frame_interval.as_secs_f64();
        }

        if raw_delta < self.frame_interval {
            let wait = self.frame_interval - raw_delta;
            if wait >= MIN_SLEEP {
                self.time.sleep(wait);
            }
        }

        let woke = self.time.now();
        let real_dt = woke.saturating_sub(self.last_tick.unwrap_or(t0));
        self.last_tick = Some(woke);
        self.elapsed += real_dt;

        if self.rendered_since_complete {
            self.fps_frames += 1;
            self.rendered_since_complete = false;
        }
        self.fps_timer += real_dt;
        while self.fps_timer >= Duration::from_secs(1) {
            self.fps_timer -= Duration::from_secs(1);
            self.measured_fps = Some(self.fps_frames);
            self.fps_frames = 0;
        }

        if self.should_end() {
            self.state = ClockState::Ended;
        }
    }

    /// Jump to the next frame boundary without waiting, for frame-advance
    /// mode.
    pub fn step_frame(&mut self) {
        let next = self.last_rendered.map_or(0, |f| f + 1);
        let boundary = Duration::from_nanos((next as f64 * 1e9 / self.fps).round() as u64);
        self.elapsed = self.elapsed.max(boundary);
        self.last_tick = Some(self.time.now());
        self.rendered_since_complete = false;
        if self.should_end() {
            self.state = ClockState::Ended;
        }
    }

    /// Change the playback rate. Non-positive rates are ignored.
    ///
    /// Playback time is re-scaled so the current frame stays on screen, and
    /// subtitle cues are re-timed to match.
    pub fn set_frame_rate(&mut self, fps: f64) {
        if !(fps > 0.0) || fps == self.fps {
            return;
        }
        self.elapsed = self.elapsed.mul_f64(self.fps / fps);
        self.fps = fps;
        self.duration = self.total_frames as f64 / fps;
        self.frame_interval = Duration::from_secs_f64(1.0 / fps);
        if let Some(subs) = self.subtitles.as_mut() {
            subs.rescale(fps);
        }
        log::debug!("playback rate set to {} fps", fps);
    }

    /// Mark the stream finished regardless of elapsed time.
    pub fn end(&mut self) {
        self.state = ClockState::Ended;
    }
}

//! The render loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    Banner, FrameSource, Key, PlainBanner, PlaybackClock, PlaybackError, Placement, StatusInfo,
    Surface, TimeSource, status_placements, subtitle_placements, title_screen,
};
use crate::audio::AudioTrigger;
use crate::raster::{Frame, Rasterizer};
use crate::schema::PlaybackConfig;
use crate::subtitle::SubtitleWindow;

/// Lowest and highest rate reachable with the rate keys.
const MIN_RATE: f64 = 1.0;
const MAX_RATE: f64 = 255.0;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Elapsed time reached the stream duration.
    Finished,
    /// The source ran out of frames first.
    EndOfStream,
    /// Quit key or exit flag.
    UserAbort,
}

/// Outcome of [`Session::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub reason: EndReason,
    pub frames_rendered: u64,
    /// Frames passed over because rendering fell behind the clock.
    pub frames_dropped: u64,
    /// Frames whose chunk failed to decode.
    pub frames_corrupt: u64,
    pub elapsed_secs: f64,
}

/// A playback session: one source, one surface, one clock.
///
/// Usage:
/// ```ignore
/// let mut session = Session::new(surface, reader, SystemClock::new(), &config)?
///     .with_audio(AudioTrigger::new(CommandAudioBackend::default(), "audio.wav"));
/// let summary = session.run()?;
/// ```
pub struct Session<S: Surface, F: FrameSource, T: TimeSource> {
    surface: S,
    source: F,
    clock: PlaybackClock<T>,
    rasterizer: Rasterizer,
    config: PlaybackConfig,
    banner: Box<dyn Banner>,
    audio: Option<AudioTrigger>,
    exit: Arc<AtomicBool>,
    /// Next frame index the source can still deliver.
    next_index: u64,
    frames_rendered: u64,
    frames_dropped: u64,
    frames_corrupt: u64,
}

impl<S: Surface, F: FrameSource, T: TimeSource> Session<S, F, T> {
    pub fn new(
        surface: S,
        source: F,
        time: T,
        config: &PlaybackConfig,
    ) -> Result<Self, PlaybackError> {
        config.validate()?;
        let rasterizer = Rasterizer::new(&config.raster)?;
        let clock = PlaybackClock::new(time, source.fps(), source.frame_count());

        Ok(Self {
            surface,
            source,
            clock,
            rasterizer,
            config: config.clone(),
            banner: Box::new(PlainBanner),
            audio: None,
            exit: Arc::new(AtomicBool::new(false)),
            next_index: 0,
            frames_rendered: 0,
            frames_dropped: 0,
            frames_corrupt: 0,
        })
    }

    pub fn with_subtitles(mut self, window: SubtitleWindow) -> Self {
        self.clock = self.clock.with_subtitles(window);
        self
    }

    pub fn with_audio(mut self, audio: AudioTrigger) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Render the title screen with `banner` instead of plain text.
    pub fn with_banner(mut self, banner: Box<dyn Banner>) -> Self {
        self.banner = banner;
        self
    }

    /// Flag that stops the loop at its next iteration when set.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit)
    }

    pub fn clock(&self) -> &PlaybackClock<T> {
        &self.clock
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Play until the stream ends or the user quits.
    pub fn run(&mut self) -> Result<SessionSummary, PlaybackError> {
        if self.config.wait_for_input && !self.show_title_screen()? {
            return Ok(self.summary(EndReason::UserAbort));
        }

        if let Some(audio) = self.audio.take() {
            audio.fire();
        }
        log::info!(
            "playing {} frames at {} fps",
            self.source.frame_count(),
            self.clock.fps()
        );

        let reason = loop {
            if self.poll_input()? || self.exit.load(Ordering::Relaxed) {
                break EndReason::UserAbort;
            }
            if self.clock.should_end() {
                break EndReason::Finished;
            }

            if self.clock.should_rerender() {
                let index = self.clock.mark_rendered();
                if index >= self.next_index {
                    match self.present(index)? {
                        Some(reason) => break reason,
                        None if self.config.frame_advance => {
                            let key = self.surface.wait_key()?;
                            if self.handle_key(key) {
                                break EndReason::UserAbort;
                            }
                            self.clock.step_frame();
                            continue;
                        }
                        None => {}
                    }
                }
            }

            let now = self.clock.now();
            self.clock.complete_frame(now);
        };

        let summary = self.summary(reason);
        log::info!(
            "playback stopped ({:?}): {} rendered, {} dropped, {} corrupt, {:.2}s",
            summary.reason,
            summary.frames_rendered,
            summary.frames_dropped,
            summary.frames_corrupt,
            summary.elapsed_secs
        );
        Ok(summary)
    }

    /// Decode and draw frame `index`. Returns a reason to stop if the
    /// source is exhausted.
    fn present(&mut self, index: u64) -> Result<Option<EndReason>, PlaybackError> {
        let dropped = index - self.next_index;
        if dropped > 0 {
            log::trace!("dropping {} frames to catch up", dropped);
            self.frames_dropped += dropped;
        }

        let result = self.source.advance_to(index);
        self.next_index = index + 1;
        match result {
            None => Ok(Some(EndReason::EndOfStream)),
            Some(Ok(frame)) => {
                self.render(&frame, index)?;
                self.frames_rendered += 1;
                Ok(None)
            }
            Some(Err(e)) if e.is_recoverable() => {
                log::warn!("skipping frame {}: {}", index, e);
                self.frames_corrupt += 1;
                Ok(None)
            }
            Some(Err(e)) => Err(e.into()),
        }
    }

    fn render(&mut self, frame: &Frame, index: u64) -> Result<(), PlaybackError> {
        let (cols, rows) = self.surface.size()?;
        let (cols, rows) = (cols as usize, rows as usize);

        // The last column stays empty so a full row never wraps.
        let grid = self.rasterizer.resample(frame, cols.saturating_sub(1), rows);
        self.surface.draw_grid(&grid)?;

        let info = StatusInfo {
            frame: index,
            total_frames: self.source.frame_count(),
            elapsed_secs: self.clock.elapsed_secs(),
            duration_secs: self.clock.duration_secs(),
            measured_fps: self.clock.measured_fps(),
            frame_delta_secs: self.clock.last_frame_delta(),
        };
        let mut overlay = status_placements(&info, self.config.debug, self.config.frame_advance);
        if let Some(subs) = self.clock.subtitles_mut() {
            overlay.extend(subtitle_placements(subs.active_lines(), cols, rows));
        }
        self.draw_all(&overlay)?;

        self.surface.flush()?;
        Ok(())
    }

    fn draw_all(&mut self, placements: &[Placement]) -> Result<(), PlaybackError> {
        for p in placements {
            let col = u16::try_from(p.col).unwrap_or(u16::MAX);
            let row = u16::try_from(p.row).unwrap_or(u16::MAX);
            self.surface.draw_text(col, row, &p.text)?;
        }
        Ok(())
    }

    /// Show the start screen. Returns `false` if the user quit from it.
    fn show_title_screen(&mut self) -> Result<bool, PlaybackError> {
        let (_, rows) = self.surface.size()?;
        let screen = title_screen(
            self.banner.as_ref(),
            self.config.title.as_deref(),
            rows as usize,
        );

        self.surface.clear()?;
        self.draw_all(&screen)?;
        self.surface.flush()?;

        let key = self.surface.wait_key()?;
        if key.is_quit() {
            self.exit.store(true, Ordering::Relaxed);
            return Ok(false);
        }
        self.surface.clear()?;
        Ok(true)
    }

    /// Drain pending key presses. Returns `true` on a quit key.
    fn poll_input(&mut self) -> Result<bool, PlaybackError> {
        while let Some(key) = self.surface.poll_key()? {
            if self.handle_key(key) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// React to one key press. Returns `true` on a quit key.
    fn handle_key(&mut self, key: Key) -> bool {
        match key {
            k if k.is_quit() => {
                self.exit.store(true, Ordering::Relaxed);
                return true;
            }
            Key::Char('+') | Key::Char('=') => self.change_rate(1.0),
            Key::Char('-') | Key::Char('_') => self.change_rate(-1.0),
            _ => {}
        }
        false
    }

    fn change_rate(&mut self, step: f64) {
        let fps = (self.clock.fps().round() + step).clamp(MIN_RATE, MAX_RATE);
        if fps != self.clock.fps() {
            self.clock.set_frame_rate(fps);
            log::info!("playback rate: {} fps", fps);
        }
    }

    fn summary(&self, reason: EndReason) -> SessionSummary {
        SessionSummary {
            reason,
            frames_rendered: self.frames_rendered,
            frames_dropped: self.frames_dropped,
            frames_corrupt: self.frames_corrupt,
            elapsed_secs: self.clock.elapsed_secs(),
        }
    }
}

//! Crossterm-backed drawing surface.

use std::io::{self, BufWriter, Stdout, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::playback::{Key, Surface};
use crate::raster::GlyphGrid;

/// Set while a [`TerminalSurface`] holds the terminal in playback mode.
static PLAYBACK_MODE: AtomicBool = AtomicBool::new(false);

/// Install a panic hook that puts the terminal back into its normal mode
/// before the panic is reported.
///
/// Without it the message is printed to the alternate screen and lost when
/// the surface is dropped during unwinding. The previous hook still runs
/// afterwards. Does nothing unless a surface is active.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        reset_after_panic();
        previous(info);
    }));
}

/// Leave playback mode without a surface at hand. Returns whether the
/// terminal was in playback mode.
fn reset_after_panic() -> bool {
    if !PLAYBACK_MODE.swap(false, Ordering::SeqCst) {
        return false;
    }
    let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    true
}

/// The controlling terminal in raw mode on the alternate screen.
///
/// The previous terminal mode is restored by [`TerminalSurface::restore`] or,
/// failing that, when the surface is dropped.
pub struct TerminalSurface {
    out: BufWriter<Stdout>,
    cols: u16,
    active: bool,
}

impl TerminalSurface {
    /// Switch the terminal into playback mode.
    pub fn enter() -> io::Result<Self> {
        let (cols, _) = terminal::size()?;
        terminal::enable_raw_mode()?;
        PLAYBACK_MODE.store(true, Ordering::SeqCst);

        let mut surface = Self {
            out: BufWriter::new(io::stdout()),
            cols,
            active: true,
        };
        execute!(surface.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        log::debug!("terminal: entered raw mode");
        Ok(surface)
    }

    /// Return the terminal to its original mode. Safe to call repeatedly.
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        PLAYBACK_MODE.store(false, Ordering::SeqCst);

        let screen = execute!(self.out, Show, LeaveAlternateScreen);
        let raw = terminal::disable_raw_mode();
        log::debug!("terminal: restored");
        screen.and(raw)
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

impl Surface for TerminalSurface {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn draw_grid(&mut self, grid: &GlyphGrid) -> io::Result<()> {
        for (y, line) in grid.lines().enumerate() {
            let Ok(row) = u16::try_from(y) else {
                break;
            };
            queue!(self.out, MoveTo(0, row), Print(line))?;
        }
        Ok(())
    }

    fn draw_text(&mut self, col: u16, row: u16, text: &str) -> io::Result<()> {
        let room = self.cols.saturating_sub(col) as usize;
        if room == 0 {
            return Ok(());
        }
        let clipped: String = text.chars().take(room).collect();
        queue!(self.out, MoveTo(col, row), Print(clipped))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn poll_key(&mut self) -> io::Result<Option<Key>> {
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    return Ok(Some(map_key(key)));
                }
                Event::Resize(cols, _) => {
                    self.cols = cols;
                    queue!(self.out, Clear(ClearType::All))?;
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn wait_key(&mut self) -> io::Result<Key> {
        loop {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => return Ok(map_key(key)),
                Event::Resize(cols, _) => self.cols = cols,
                _ => {}
            }
        }
    }
}

fn map_key(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Esc => Key::Esc,
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c), Key::Interrupt);

        let c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(map_key(c), Key::Char('c'));

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert!(map_key(esc).is_quit());

        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(map_key(up), Key::Other);
    }

    #[test]
    fn test_panic_reset_only_when_active() {
        assert!(!reset_after_panic());

        PLAYBACK_MODE.store(true, Ordering::SeqCst);
        assert!(reset_after_panic());
        assert!(!PLAYBACK_MODE.load(Ordering::SeqCst));
        assert!(!reset_after_panic());
    }
}

//! crossterm backend for the viewer.

use crate::pager::{Input, Key, Screen};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, queue, style, terminal};
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

/// Puts the terminal back the way a shell expects it.
///
/// Safe to call more than once and from the signal listener thread.
pub fn restore() -> io::Result<()> {
    let mut out = io::stdout();
    let screen = execute!(
        out,
        terminal::Clear(terminal::ClearType::All),
        cursor::Show,
        terminal::LeaveAlternateScreen
    );
    let raw = terminal::disable_raw_mode();
    screen.and(raw)
}

/// The real terminal, in raw mode on the alternate screen.
///
/// Entering takes over the terminal; dropping (or [`TerminalScreen::leave`])
/// gives it back, including when the viewer fails.
pub struct TerminalScreen {
    out: Stdout,
    active: bool,
}

impl TerminalScreen {
    /// Switches to raw mode and the alternate screen.
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        if let Err(error) = execute!(out, terminal::EnterAlternateScreen, cursor::Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(error);
        }
        Ok(Self { out, active: true })
    }

    /// Restores the terminal.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        restore()
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

fn translate(code: KeyCode, modifiers: KeyModifiers) -> Key {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Esc => Key::Escape,
        _ => Key::Other,
    }
}

impl Screen for TerminalScreen {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, terminal::Clear(terminal::ClearType::All))
    }

    fn print_at(&mut self, col: u16, row: u16, text: &str) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(col, row), style::Print(text))
    }

    fn clear_line(&mut self, row: u16) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, row),
            terminal::Clear(terminal::ClearType::CurrentLine)
        )
    }

    fn show_cursor(&mut self, visible: bool) -> io::Result<()> {
        if visible {
            queue!(self.out, cursor::Show)
        } else {
            queue!(self.out, cursor::Hide)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn next_input(&mut self, timeout: Duration) -> io::Result<Input> {
        let deadline = deadline_after(Instant::now(), timeout);
        loop {
            // Without a representable deadline, wait for the next event.
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() || !event::poll(remaining)? {
                    return Ok(Input::Timeout);
                }
            }
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    return Ok(Input::Key(translate(key.code, key.modifiers)))
                }
                Event::Resize(_, _) => return Ok(Input::Resize),
                // Focus, mouse, paste and key releases do not count as activity.
                _ => {}
            }
        }
    }
}

/// `now + timeout`, or `None` when that instant cannot be represented.
fn deadline_after(now: Instant, timeout: Duration) -> Option<Instant> {
    now.checked_add(timeout)
}

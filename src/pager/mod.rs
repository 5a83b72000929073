//! The interactive viewer.
//!
//! A small state machine over a [`Screen`]:
//!
//! - **Listing** draws the visible results as a centred block and waits for
//!   one key. `/` opens the keyword prompt; any other key, or the inactivity
//!   timeout, exits.
//! - **KeywordPrompt** reads a keyword line on the bottom row, re-filters the
//!   result set with it and goes back to Listing.
//!
//! A terminal resize at any point is fatal. Ctrl-C in either state ends the
//! run with [`AppError::Interrupted`], so the process exits as it would on
//! SIGINT. The screen is cleared on every state entry.

pub mod terminal;

pub use terminal::TerminalScreen;

use crate::constants::{
    KEYWORD_LINE_MAX_LEN, KEYWORD_PROMPT, MSG_TOO_MANY_RESULTS, REFINE_KEY, RESULTS_MAX_LEN,
};
use crate::errors::{AppError, AppResult};
use crate::results::{FilterMode, KeywordSet, ResultSet};
use std::io;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroize;

/// A key press, reduced to what the viewer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// Return.
    Enter,
    /// Backspace.
    Backspace,
    /// Escape.
    Escape,
    /// Ctrl-C, which raw mode delivers as a key.
    Interrupt,
    /// Anything else.
    Other,
}

/// What waiting on the terminal produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A key was pressed.
    Key(Key),
    /// The terminal changed size.
    Resize,
    /// Nothing happened before the timeout.
    Timeout,
}

/// The drawing and input surface the viewer needs.
pub trait Screen {
    /// `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;
    /// Blanks the whole screen.
    fn clear(&mut self) -> io::Result<()>;
    /// Writes `text` starting at the given cell.
    fn print_at(&mut self, col: u16, row: u16, text: &str) -> io::Result<()>;
    /// Blanks one row.
    fn clear_line(&mut self, row: u16) -> io::Result<()>;
    /// Shows or hides the cursor.
    fn show_cursor(&mut self, visible: bool) -> io::Result<()>;
    /// Pushes pending output to the terminal.
    fn flush(&mut self) -> io::Result<()>;
    /// Waits up to `timeout` for a key or a resize.
    fn next_input(&mut self, timeout: Duration) -> io::Result<Input>;
}

/// Where the viewer starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Show the current listing first.
    Listing,
    /// Ask for keywords first.
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Listing,
    KeywordPrompt,
    Exit,
}

/// Placement of the listing on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Too many results; show only the refine message at this cell.
    TooMany {
        /// Column of the message
        col: u16,
        /// Row of the message
        row: u16,
    },
    /// One result per row starting at `top`, all starting at column `left`.
    Listing {
        /// First row
        top: u16,
        /// Common left column
        left: u16,
    },
}

/// Computes the layout for `visible` results whose longest is `widest`
/// characters on a `width` by `height` terminal.
pub fn layout(visible: usize, widest: usize, width: u16, height: u16) -> Layout {
    if visible >= usize::from(height) || visible >= RESULTS_MAX_LEN {
        let message = MSG_TOO_MANY_RESULTS.chars().count();
        return Layout::TooMany {
            col: centre(usize::from(width), message),
            row: height / 2,
        };
    }
    // visible < height here, so the subtraction and cast are in range.
    let top = (height - visible as u16) / 2;
    Layout::Listing {
        top,
        left: centre(usize::from(width), widest),
    }
}

fn centre(width: usize, len: usize) -> u16 {
    // Clamped to u16 because width came from one.
    (width.saturating_sub(len) / 2) as u16
}

/// Rows a line of `len` characters occupies once the terminal wraps it.
fn rows_for(len: usize, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    len.div_ceil(width).clamp(1, usize::from(u16::MAX)) as u16
}

/// The viewer over a result set.
pub struct Viewer<'a, S: Screen> {
    screen: S,
    results: &'a mut ResultSet,
    mode: FilterMode,
    timeout: Duration,
}

impl<'a, S: Screen> Viewer<'a, S> {
    /// Creates a viewer that waits at most `timeout` for each key.
    pub fn new(screen: S, results: &'a mut ResultSet, mode: FilterMode, timeout: Duration) -> Self {
        Self {
            screen,
            results,
            mode,
            timeout,
        }
    }

    /// Runs until the user leaves or the timeout fires.
    pub fn run(&mut self, start: StartMode) -> AppResult<()> {
        let mut state = match start {
            StartMode::Listing => State::Listing,
            StartMode::Prompt => State::KeywordPrompt,
        };
        loop {
            debug!(?state, "viewer state");
            state = match state {
                State::Listing => self.listing()?,
                State::KeywordPrompt => self.keyword_prompt()?,
                State::Exit => break,
            };
        }
        self.screen.clear()?;
        self.screen.flush()?;
        Ok(())
    }

    /// Gives the screen back, for callers that need to restore it.
    pub fn into_screen(self) -> S {
        self.screen
    }

    fn listing(&mut self) -> AppResult<State> {
        self.screen.clear()?;
        self.render()?;
        self.screen.flush()?;

        match self.screen.next_input(self.timeout)? {
            Input::Key(Key::Char(REFINE_KEY)) => Ok(State::KeywordPrompt),
            Input::Key(Key::Interrupt) => Err(AppError::Interrupted),
            Input::Resize => Err(AppError::TerminalResized),
            Input::Key(_) | Input::Timeout => Ok(State::Exit),
        }
    }

    fn render(&mut self) -> io::Result<()> {
        let (width, height) = self.screen.size()?;
        let visible = self.results.visible_count();
        let widest = self.results.widest_visible();

        match layout(visible, widest, width, height) {
            Layout::TooMany { col, row } => self.screen.print_at(col, row, MSG_TOO_MANY_RESULTS),
            Layout::Listing { top, left } => {
                let mut row = top;
                for entry in self.results.visible() {
                    if row >= height {
                        break;
                    }
                    self.screen.print_at(left, row, entry.text())?;
                    row = row.saturating_add(rows_for(entry.char_len(), width));
                }
                Ok(())
            }
        }
    }

    fn keyword_prompt(&mut self) -> AppResult<State> {
        self.screen.clear()?;
        let (_, height) = self.screen.size()?;
        let row = height.saturating_sub(1);
        let mut line = String::new();

        let outcome = self.read_keywords(row, &mut line);
        let _ = self.screen.show_cursor(false);
        let next = match outcome {
            Ok(Prompt::Submitted) => {
                let keywords = KeywordSet::parse(&line);
                self.results
                    .filter(&keywords, self.mode)
                    .map(|count| {
                        debug!(keywords = keywords.len(), visible = count, "search refined");
                        State::Listing
                    })
            }
            Ok(Prompt::Cancelled) => Ok(State::Listing),
            Ok(Prompt::Abandoned) => Ok(State::Exit),
            Err(error) => Err(error),
        };
        line.zeroize();
        next
    }

    /// Echoes input on `row` until Return.
    fn read_keywords(&mut self, row: u16, line: &mut String) -> AppResult<Prompt> {
        self.screen.print_at(0, row, KEYWORD_PROMPT)?;
        self.screen.show_cursor(true)?;
        self.screen.flush()?;

        loop {
            match self.screen.next_input(self.timeout)? {
                Input::Key(Key::Enter) => return Ok(Prompt::Submitted),
                Input::Key(Key::Escape) => return Ok(Prompt::Cancelled),
                Input::Key(Key::Interrupt) => return Err(AppError::Interrupted),
                Input::Timeout => return Ok(Prompt::Abandoned),
                Input::Resize => return Err(AppError::TerminalResized),
                Input::Key(Key::Char(c)) => {
                    if line.chars().count() < KEYWORD_LINE_MAX_LEN && !c.is_control() {
                        line.push(c);
                    }
                }
                Input::Key(Key::Backspace) => {
                    line.pop();
                }
                Input::Key(Key::Other) => continue,
            }
            self.screen.clear_line(row)?;
            self.screen.print_at(0, row, KEYWORD_PROMPT)?;
            self.screen
                .print_at(KEYWORD_PROMPT.len() as u16, row, line.as_str())?;
            self.screen.flush()?;
        }
    }
}

/// How the keyword prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    /// Return: apply the typed keywords.
    Submitted,
    /// Escape: keep the current keywords.
    Cancelled,
    /// Timeout: leave the viewer.
    Abandoned,
}

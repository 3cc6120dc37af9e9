//! Interactive prompting and status output
//!
//! The workflow talks to the user only through [`UserInteraction`], so the
//! credential and sync logic can be driven by a scripted fake in tests.

use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal;

use crate::error::{Result, ShipitError};

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Step announcement, printed as-is
    Info,
    /// Completed step (✔)
    Success,
    /// Failed step (✘)
    Failure,
    /// Instruction the user must act on (>>)
    StrictInfo,
}

/// Prompt behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOptions {
    /// Hide typed characters
    pub masked: bool,
    /// Accept an empty answer
    pub allow_empty: bool,
}

impl PromptOptions {
    pub fn masked() -> Self {
        Self {
            masked: true,
            allow_empty: false,
        }
    }

    pub fn optional() -> Self {
        Self {
            masked: false,
            allow_empty: true,
        }
    }
}

/// Capability for talking to the user
pub trait UserInteraction {
    /// Ask for a line of text. Answers are returned trimmed.
    fn prompt(&self, label: &str, options: PromptOptions) -> Result<String>;

    /// Present a fixed menu and return the index of the chosen item
    fn select(&self, label: &str, items: &[&str]) -> Result<usize>;

    /// Emit a leveled status line
    fn status(&self, level: StatusLevel, message: &str);
}

/// Render a status line the way the terminal shows it
pub fn format_status(level: StatusLevel, message: &str) -> String {
    match level {
        StatusLevel::Info => message.to_string(),
        StatusLevel::StrictInfo => format!("{} {}", ">>".green(), message.green()),
        StatusLevel::Success => format!("{} {}", "✔".green(), quiet(message).dim()),
        StatusLevel::Failure => format!("{} {}", "✘".red(), quiet(message).dim()),
    }
}

/// Lowercase and strip periods for the terse success/failure style
fn quiet(message: &str) -> String {
    message.to_lowercase().replace('.', "")
}

/// Symbol prefixed to fatal errors
pub fn error_symbol() -> String {
    "✘".red().to_string()
}

/// Real terminal implementation
#[derive(Debug, Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> Result<String> {
        let mut input = String::new();
        let read = io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            // stdin closed
            return Err(ShipitError::Cancelled);
        }
        Ok(input.trim().to_string())
    }

    /// Read a secret without echo. The input is returned exactly as typed,
    /// surrounding spaces included.
    fn read_masked(&self) -> Result<String> {
        let _guard = RawModeGuard::enable()?;
        let mut secret = String::new();

        loop {
            if let Event::Key(key) = event::read()? {
                if !apply_masked_key(&mut secret, key)? {
                    break;
                }
            }
        }

        Ok(secret)
    }
}

/// Fold one key press into a masked secret; false once Enter is pressed
fn apply_masked_key(secret: &mut String, key: KeyEvent) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(true);
    }
    match key.code {
        KeyCode::Enter => return Ok(false),
        KeyCode::Esc => return Err(ShipitError::Cancelled),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Err(ShipitError::Cancelled)
        }
        KeyCode::Backspace => {
            secret.pop();
        }
        KeyCode::Char(c) => secret.push(c),
        _ => {}
    }
    Ok(true)
}

/// Restores cooked mode when dropped, including on early return
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        println!();
    }
}

impl UserInteraction for Terminal {
    fn prompt(&self, label: &str, options: PromptOptions) -> Result<String> {
        loop {
            print!("{}: ", label);
            io::stdout().flush()?;

            let answer = if options.masked {
                self.read_masked()?
            } else {
                self.read_line()?
            };

            if !answer.is_empty() || options.allow_empty {
                return Ok(answer);
            }
            println!("{} {}", "✘".red(), "prompt cannot be empty".dim());
        }
    }

    fn select(&self, label: &str, items: &[&str]) -> Result<usize> {
        if items.is_empty() {
            return Err(ShipitError::InvalidInput("Nothing to select".into()));
        }

        println!("{}:", label);
        for (i, item) in items.iter().enumerate() {
            println!("  {}. {}", i + 1, item);
        }

        loop {
            print!("Select an option: ");
            io::stdout().flush()?;

            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(n - 1),
                _ => println!("invalid selection."),
            }
        }
    }

    fn status(&self, level: StatusLevel, message: &str) {
        println!("{}", format_status(level, message));
    }
}

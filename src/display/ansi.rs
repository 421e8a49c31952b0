//! ANSI escape handling
//!
//! A small SGR builder for the few styles the monitor needs, plus the
//! stripper used to keep log files free of terminal codes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// ESC followed by a C1 final byte (`0x40-0x5F` except `[`), or a full CSI sequence
pub static ANSI_ESCAPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI pattern is valid")
});

/// SGR sequence that clears every attribute
pub const RESET: &str = "\x1b[0m";

/// Terminal colors used by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Green,
}

impl Color {
    fn offset(self) -> u8 {
        match self {
            Color::Black => 0,
            Color::Green => 2,
        }
    }
}

/// A single display attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Fg(Color),
    Bg(Color),
    Dim,
}

impl Style {
    fn code(self) -> u8 {
        match self {
            Style::Fg(color) => 30 + color.offset(),
            Style::Bg(color) => 40 + color.offset(),
            Style::Dim => 2,
        }
    }
}

/// Build one SGR escape sequence from a set of styles.
///
/// An empty set yields an empty string rather than an implicit reset.
pub fn sgr(styles: &[Style]) -> String {
    if styles.is_empty() {
        return String::new();
    }
    let params: Vec<String> = styles.iter().map(|s| s.code().to_string()).collect();
    format!("\x1b[{}m", params.join(";"))
}

/// Wrap `text` in the given styles followed by a reset
pub fn paint(text: &str, styles: &[Style]) -> String {
    if styles.is_empty() {
        return text.to_string();
    }
    format!("{}{}{}", sgr(styles), text, RESET)
}

/// Whether an escape sequence clears all attributes (`ESC[m` or `ESC[0m`)
pub fn is_reset(sequence: &str) -> bool {
    matches!(sequence, "\x1b[m" | "\x1b[0m" | "\x1b[00m")
}

/// Remove every recognised escape sequence from `line`.
///
/// Removing one sequence can splice the bytes around it into a new one, so
/// the pattern is applied until nothing matches.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !ANSI_ESCAPE_PATTERN.is_match(line) {
        return Cow::Borrowed(line);
    }
    let mut stripped = ANSI_ESCAPE_PATTERN.replace_all(line, "").into_owned();
    while ANSI_ESCAPE_PATTERN.is_match(&stripped) {
        stripped = ANSI_ESCAPE_PATTERN.replace_all(&stripped, "").into_owned();
    }
    Cow::Owned(stripped)
}

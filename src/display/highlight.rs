//! Keyword highlighting for terminal output
//!
//! Only plain text is searched; escape sequences already present in the line
//! pass through untouched. After each highlighted keyword the SGR codes that
//! were active at that point are replayed, so the line's own coloring resumes
//! after our reset.

use super::ansi::{is_reset, sgr, Color, Style, ANSI_ESCAPE_PATTERN, RESET};
use regex::Regex;
use std::borrow::Cow;

/// Styles applied to a matched keyword
pub const HIGHLIGHT_STYLE: &[Style] = &[Style::Bg(Color::Green), Style::Fg(Color::Black)];

/// Parse a `--highlight` argument such as `error,warning` or `[error, warning]`
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-sensitive keyword highlighter
#[derive(Debug, Clone)]
pub struct Highlighter {
    pattern: Option<Regex>,
    style: String,
}

impl Highlighter {
    /// Build a highlighter for an ordered keyword list.
    ///
    /// Keywords are literal; when two start at the same position the one
    /// listed first wins. Empty keywords are ignored.
    pub fn new(keywords: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(k))
            .collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&alternatives.join("|"))?)
        };

        Ok(Self {
            pattern,
            style: sgr(HIGHLIGHT_STYLE),
        })
    }

    /// Whether any keyword is configured
    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    /// Return `line` with every keyword occurrence highlighted
    pub fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let Some(pattern) = &self.pattern else {
            return Cow::Borrowed(line);
        };
        if !pattern.is_match(line) {
            return Cow::Borrowed(line);
        }

        let mut out = String::with_capacity(line.len() + 32);
        let mut active: Vec<&str> = Vec::new();
        let mut last = 0;

        for esc in ANSI_ESCAPE_PATTERN.find_iter(line) {
            self.highlight_text(pattern, &line[last..esc.start()], &active, &mut out);
            let sequence = esc.as_str();
            out.push_str(sequence);
            if is_reset(sequence) {
                active.clear();
            } else if sequence.starts_with("\x1b[") && sequence.ends_with('m') {
                active.push(sequence);
            }
            last = esc.end();
        }
        self.highlight_text(pattern, &line[last..], &active, &mut out);

        Cow::Owned(out)
    }

    fn highlight_text(&self, pattern: &Regex, text: &str, active: &[&str], out: &mut String) {
        let mut last = 0;
        for m in pattern.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&self.style);
            out.push_str(m.as_str());
            out.push_str(RESET);
            for code in active {
                out.push_str(code);
            }
            last = m.end();
        }
        out.push_str(&text[last..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighter(words: &[&str]) -> Highlighter {
        let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        Highlighter::new(&words).unwrap()
    }

    #[test]
    fn test_empty_keyword_list_returns_line_unchanged() {
        let h = highlighter(&[]);
        assert!(!h.is_active());
        let line = "\x1b[31mERROR\x1b[0m: something\n";
        let out = h.apply(line);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, line);
    }

    #[test]
    fn test_plain_match() {
        let h = highlighter(&["error"]);
        assert_eq!(
            h.apply("This is an error message\n"),
            "This is an \x1b[42;30merror\x1b[0m message\n"
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let h = highlighter(&["error"]);
        assert_eq!(h.apply("ERROR: nope"), "ERROR: nope");
    }

    #[test]
    fn test_active_color_resumes_after_keyword() {
        let h = highlighter(&["error"]);
        let out = h.apply("normal \x1b[31mred error\x1b[0m tail");
        assert_eq!(
            out,
            "normal \x1b[31mred \x1b[42;30merror\x1b[0m\x1b[31m\x1b[0m tail"
        );
    }

    #[test]
    fn test_reset_clears_carried_codes() {
        let h = highlighter(&["error"]);
        let out = h.apply("normal \x1b[31mred\x1b[0m normal error");
        assert_eq!(
            out,
            "normal \x1b[31mred\x1b[0m normal \x1b[42;30merror\x1b[0m"
        );
    }

    #[test]
    fn test_non_sgr_sequences_are_not_replayed() {
        let h = highlighter(&["ok"]);
        let out = h.apply("\x1b[2K\x1b[1mok");
        assert_eq!(out, "\x1b[2K\x1b[1m\x1b[42;30mok\x1b[0m\x1b[1m");
    }

    #[test]
    fn test_keywords_inside_escape_sequences_are_ignored() {
        let h = highlighter(&["31"]);
        let out = h.apply("\x1b[31mcode 31\x1b[0m");
        assert_eq!(out, "\x1b[31mcode \x1b[42;30m31\x1b[0m\x1b[31m\x1b[0m");
    }

    #[test]
    fn test_earlier_keyword_wins_at_same_position() {
        let h = highlighter(&["err", "error"]);
        assert_eq!(h.apply("error"), "\x1b[42;30merr\x1b[0mor");
    }

    #[test]
    fn test_keywords_are_literal() {
        let h = highlighter(&["[E]"]);
        assert_eq!(h.apply("x [E] E"), "x \x1b[42;30m[E]\x1b[0m E");
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords("error,warning"), vec!["error", "warning"]);
        assert_eq!(parse_keywords("[error, warning,,]"), vec!["error", "warning"]);
        assert!(parse_keywords("").is_empty());
    }
}

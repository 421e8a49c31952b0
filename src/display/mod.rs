//! Text presentation for monitor output
//!
//! This module provides:
//! - ANSI escape stripping and a small SGR style builder
//! - Keyword highlighting that preserves existing line colors
//! - Timestamp prefixes in several formats

pub mod ansi;
pub mod highlight;
pub mod timestamp;

pub use ansi::strip_ansi;
pub use highlight::{parse_keywords, Highlighter};
pub use timestamp::TimestampMode;

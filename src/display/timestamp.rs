//! Timestamp prefixes for monitor output

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::fmt;

/// How each output line is stamped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TimestampMode {
    /// No prefix
    #[default]
    Off,
    /// UTC epoch seconds with millisecond precision
    Epoch,
    /// UTC epoch milliseconds
    Ms,
    /// UTC date and time
    Dt,
    /// UTC time of day
    Hours,
}

impl TimestampMode {
    /// Prefix for the current instant; `Off` never reads the clock
    pub fn prefix(self) -> String {
        match self {
            TimestampMode::Off => String::new(),
            mode => mode.prefix_at(Utc::now()),
        }
    }

    /// Prefix for a given instant, including the trailing space
    pub fn prefix_at(self, now: DateTime<Utc>) -> String {
        match self {
            TimestampMode::Off => String::new(),
            TimestampMode::Epoch => format!(
                "{}.{:03} ",
                now.timestamp(),
                now.timestamp_subsec_millis()
            ),
            TimestampMode::Ms => format!("{} ", now.timestamp_millis()),
            TimestampMode::Dt => format!("{} ", now.format("%Y-%m-%d %H:%M:%S%.3f")),
            TimestampMode::Hours => format!("{} ", now.format("%H:%M:%S%.3f")),
        }
    }
}

/// Lenient parse: anything unrecognised disables timestamps
impl From<&str> for TimestampMode {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "epoch" => TimestampMode::Epoch,
            "ms" => TimestampMode::Ms,
            "dt" => TimestampMode::Dt,
            "hours" => TimestampMode::Hours,
            _ => TimestampMode::Off,
        }
    }
}

impl fmt::Display for TimestampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimestampMode::Off => "off",
            TimestampMode::Epoch => "epoch",
            TimestampMode::Ms => "ms",
            TimestampMode::Dt => "dt",
            TimestampMode::Hours => "hours",
        };
        write!(f, "{}", name)
    }
}

//! Session log file
//!
//! One file per monitor invocation, named after the local session start time.
//! Every line is flushed as soon as it is written.

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default directory for session logs, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Build `<YYYY.MM.DD_HH.MM.SS>_<base>.txt`; an empty base still keeps the `_`
pub fn log_file_name(started: &DateTime<Local>, base: &str) -> String {
    format!("{}_{}.txt", started.format("%Y.%m.%d_%H.%M.%S"), base)
}

/// Append-only text destination for stripped monitor output
pub struct LogSink {
    path: PathBuf,
    writer: Box<dyn Write + Send>,
}

impl LogSink {
    /// Create the log directory if needed and open the session file for appending
    pub fn create(dir: &Path, base: &str, started: &DateTime<Local>) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(started, base));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::debug!("Opened log file {}", path.display());
        Ok(Self {
            path,
            writer: Box::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a line and flush it to disk
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name(&started(), "bench"), "2024.03.09_07.05.02_bench.txt");
        assert_eq!(log_file_name(&started(), ""), "2024.03.09_07.05.02_.txt");
    }

    #[test]
    fn test_create_makes_missing_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");

        let mut sink = LogSink::create(&logs, "run", &started()).unwrap();
        sink.write_line("[I] boot complete\n").unwrap();

        let expected = logs.join("2024.03.09_07.05.02_run.txt");
        assert_eq!(sink.path(), expected);
        assert_eq!(fs::read_to_string(expected).unwrap(), "[I] boot complete\n");
    }

    #[test]
    fn test_existing_file_is_appended() {
        let dir = tempdir().unwrap();
        {
            let mut sink = LogSink::create(dir.path(), "", &started()).unwrap();
            sink.write_line("first\n").unwrap();
        }
        let mut sink = LogSink::create(dir.path(), "", &started()).unwrap();
        sink.write_line("second\n").unwrap();

        assert_eq!(sink.path(), dir.path().join("2024.03.09_07.05.02_.txt"));
        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_create_fails_when_directory_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "not a directory").unwrap();
        assert!(LogSink::create(&blocker, "x", &started()).is_err());
    }
}

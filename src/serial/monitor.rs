//! Serial monitor session
//!
//! Provides the connection supervisor and read loop:
//! - Waits for the device to appear, showing a spinner while it retries
//! - Prints every received line with an optional timestamp and highlights
//! - Appends the uncolored text to the session log
//! - Optionally forwards typed lines to the device (send mode)

use super::forwarder::{Forwarder, InputSource, StdinSource};
use super::line::{decode_line, LineReader};
use super::logfile::{LogSink, DEFAULT_LOG_DIR};
use crate::display::ansi::{paint, Style};
use crate::display::{strip_ansi, Highlighter, TimestampMode};
use chrono::{DateTime, Local};
use colored::Colorize;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Device read timeout; paces the read loop
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Delay between attempts to open the device
pub const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Granularity of the retry wait, so Ctrl+C is noticed promptly
const RETRY_SLICE: Duration = Duration::from_millis(50);

const SPINNER_GLYPHS: [char; 4] = ['|', '/', '-', '\\'];

/// Errors that end a monitor session abnormally
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid highlight keywords: {0}")]
    Highlight(#[from] regex::Error),

    #[error("log file {}: {source}", .path.display())]
    LogSink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to console: {0}")]
    Console(#[source] io::Error),

    #[error("failed to start input forwarder: {0}")]
    Forwarder(#[source] io::Error),
}

/// Settings for one monitor invocation
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Resolved device path (e.g. /dev/ttyACM0, COM3)
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub retry_interval: Duration,
    pub timestamp: TimestampMode,
    /// Highlight keywords, earlier entries win on overlap
    pub highlight: Vec<String>,
    pub log_enabled: bool,
    pub log_dir: PathBuf,
    /// Base name appended to the log file timestamp
    pub log_name: String,
    /// Forward standard input to the device
    pub send: bool,
    /// Clear the terminal before starting
    pub clear: bool,
}

impl SessionConfig {
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            baud_rate: 115_200,
            read_timeout: READ_TIMEOUT,
            retry_interval: RETRY_INTERVAL,
            timestamp: TimestampMode::Off,
            highlight: Vec::new(),
            log_enabled: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_name: String::new(),
            send: false,
            clear: false,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timestamp(mut self, mode: TimestampMode) -> Self {
        self.timestamp = mode;
        self
    }

    pub fn with_highlight(mut self, keywords: Vec<String>) -> Self {
        self.highlight = keywords;
        self
    }

    /// Enable logging into `dir` with the given file base name
    pub fn with_logging(mut self, dir: impl Into<PathBuf>, name: &str) -> Self {
        self.log_enabled = true;
        self.log_dir = dir.into();
        self.log_name = name.to_string();
        self
    }

    pub fn with_send(mut self, send: bool) -> Self {
        self.send = send;
        self
    }

    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Open the session log if logging is enabled
    pub fn open_log(&self, started: &DateTime<Local>) -> Result<Option<LogSink>, MonitorError> {
        if !self.log_enabled {
            return Ok(None);
        }
        LogSink::create(&self.log_dir, &self.log_name, started)
            .map(Some)
            .map_err(|source| MonitorError::LogSink {
                path: self.log_dir.clone(),
                source,
            })
    }

    /// Operator input for send mode; standard input is left alone otherwise
    pub fn open_input(&self) -> Option<StdinSource> {
        self.send.then(StdinSource::new)
    }
}

/// Shared cancellation flag, set from the Ctrl+C handler
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Supervisor connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Cancelled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stopped by the user
    Cancelled,
    /// The device failed while connected
    Disconnected(String),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Cancelled => 0,
            SessionOutcome::Disconnected(_) => 1,
        }
    }
}

/// An open device
pub trait Transport: Read + Send {
    /// A second handle for writing from another thread
    fn writer(&self) -> io::Result<Box<dyn Write + Send>>;
}

/// Opens the device for the supervisor
pub trait Connector {
    fn connect(&mut self) -> io::Result<Box<dyn Transport>>;

    /// Device name shown to the user
    fn describe(&self) -> &str;
}

/// "Waiting for device" indicator
#[derive(Debug, Default)]
pub struct Spinner {
    counter: usize,
    drawn: bool,
}

impl Spinner {
    pub fn glyph(&self) -> char {
        SPINNER_GLYPHS[self.counter % SPINNER_GLYPHS.len()]
    }

    /// Redraw the waiting line and advance; returns the next counter
    pub fn tick<W: Write>(&mut self, out: &mut W, device: &str) -> io::Result<usize> {
        let text = format!("{} Waiting for {}...", self.glyph(), device);
        write!(out, "\r{}", paint(&text, &[Style::Dim]))?;
        out.flush()?;
        self.drawn = true;
        self.counter = (self.counter + 1) % SPINNER_GLYPHS.len();
        Ok(self.counter)
    }

    /// Erase the waiting line if one was drawn
    pub fn clear<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.drawn {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            out.flush()?;
            self.drawn = false;
        }
        Ok(())
    }
}

/// Turns text into a console line and a log line
struct LinePrinter<'a> {
    timestamp: TimestampMode,
    highlighter: &'a Highlighter,
}

impl LinePrinter<'_> {
    fn emit<W: Write>(
        &self,
        console: &mut W,
        sink: Option<&mut LogSink>,
        text: &str,
    ) -> Result<(), MonitorError> {
        let line = format!("{}{}", self.timestamp.prefix(), text);

        let shown = self.highlighter.apply(&line);
        console
            .write_all(shown.as_bytes())
            .and_then(|_| console.flush())
            .map_err(MonitorError::Console)?;

        if let Some(sink) = sink {
            sink.write_line(&strip_ansi(&line))
                .map_err(|source| MonitorError::LogSink {
                    path: sink.path().to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }

    fn drain<W: Write>(
        &self,
        echoes: &Receiver<String>,
        console: &mut W,
        sink: &mut Option<&mut LogSink>,
    ) -> Result<(), MonitorError> {
        while let Ok(line) = echoes.try_recv() {
            self.emit(console, sink.as_deref_mut(), &line)?;
        }
        Ok(())
    }
}

/// Owns the device for one monitor invocation
pub struct Supervisor<'a, C: Connector> {
    config: &'a SessionConfig,
    connector: C,
    cancel: CancelFlag,
    highlighter: Highlighter,
    state: ConnectionState,
}

impl<'a, C: Connector> Supervisor<'a, C> {
    pub fn new(config: &'a SessionConfig, connector: C, cancel: CancelFlag) -> Result<Self, MonitorError> {
        let highlighter = Highlighter::new(&config.highlight)?;
        if highlighter.is_active() {
            log::debug!("Highlighting {:?}", config.highlight);
        }
        Ok(Self {
            config,
            connector,
            cancel,
            highlighter,
            state: ConnectionState::Idle,
        })
    }

    #[cfg(test)]
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        log::debug!("Monitor state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Connect (retrying until the device appears) and monitor until it is lost or the user stops
    pub fn run<W: Write>(
        &mut self,
        console: &mut W,
        mut sink: Option<&mut LogSink>,
        input: Option<&mut dyn InputSource>,
    ) -> Result<SessionOutcome, MonitorError> {
        self.transition(ConnectionState::Connecting);

        let mut spinner = Spinner::default();
        let transport = loop {
            if self.cancel.is_cancelled() {
                spinner.clear(console).map_err(MonitorError::Console)?;
                self.transition(ConnectionState::Cancelled);
                return Ok(SessionOutcome::Cancelled);
            }
            match self.connector.connect() {
                Ok(transport) => break transport,
                Err(e) => {
                    log::debug!("Open {} failed: {}", self.connector.describe(), e);
                    spinner
                        .tick(console, self.connector.describe())
                        .map_err(MonitorError::Console)?;
                    self.wait_retry();
                }
            }
        };

        spinner.clear(console).map_err(MonitorError::Console)?;
        self.transition(ConnectionState::Connected);
        writeln!(
            console,
            "{} Connected to {} at {} baud",
            "[OK]".green().bold(),
            self.connector.describe().white().bold(),
            self.config.baud_rate
        )
        .map_err(MonitorError::Console)?;
        if let Some(sink) = sink.as_deref() {
            writeln!(console, "{} Logging to: {}", "[LOG]".cyan().bold(), sink.path().display())
                .map_err(MonitorError::Console)?;
        }

        let outcome = self.session(console, &mut sink, transport, input)?;

        match &outcome {
            SessionOutcome::Cancelled => {
                self.transition(ConnectionState::Cancelled);
                writeln!(console, "\n{}", "Stopping monitor...".yellow())
                    .map_err(MonitorError::Console)?;
            }
            SessionOutcome::Disconnected(reason) => {
                self.transition(ConnectionState::Disconnected);
                writeln!(console, "\nMonitor: Disconnected ({})", reason)
                    .map_err(MonitorError::Console)?;
            }
        }
        Ok(outcome)
    }

    /// Sleep out the retry interval in slices; stops early on cancel
    fn wait_retry(&self) {
        let deadline = Instant::now() + self.config.retry_interval;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(RETRY_SLICE));
        }
    }

    fn session<W: Write>(
        &self,
        console: &mut W,
        sink: &mut Option<&mut LogSink>,
        transport: Box<dyn Transport>,
        input: Option<&mut dyn InputSource>,
    ) -> Result<SessionOutcome, MonitorError> {
        let (echo_tx, echo_rx) = mpsc::channel();
        let stop = AtomicBool::new(false);

        let forwarder = match input {
            Some(input) if self.config.send => {
                let writer = transport.writer().map_err(MonitorError::Forwarder)?;
                Some((Forwarder::new(writer, echo_tx, &stop, self.cancel.clone()), input))
            }
            _ => {
                drop(echo_tx);
                None
            }
        };

        let printer = LinePrinter {
            timestamp: self.config.timestamp,
            highlighter: &self.highlighter,
        };
        let mut reader = LineReader::new(transport);

        thread::scope(|scope| {
            let handle = forwarder.map(|(fwd, input)| scope.spawn(move || fwd.run(input)));

            let result = self.read_loop(&mut reader, &printer, console, sink, &echo_rx);

            stop.store(true, Ordering::SeqCst);
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    log::error!("Input forwarder panicked");
                }
            }

            // Lines sent just before the loop ended still belong in the transcript
            let outcome = result?;
            printer.drain(&echo_rx, console, sink)?;
            Ok(outcome)
        })
    }

    fn read_loop<R: Read, W: Write>(
        &self,
        reader: &mut LineReader<R>,
        printer: &LinePrinter<'_>,
        console: &mut W,
        sink: &mut Option<&mut LogSink>,
        echoes: &Receiver<String>,
    ) -> Result<SessionOutcome, MonitorError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(SessionOutcome::Cancelled);
            }

            printer.drain(echoes, console, sink)?;

            match reader.read_line() {
                Ok(Some(bytes)) => printer.emit(console, sink.as_deref_mut(), &decode_line(&bytes))?,
                Ok(None) => {}
                Err(e) => {
                    log::debug!("Read from {} failed: {}", self.connector.describe(), e);
                    return Ok(SessionOutcome::Disconnected(e.to_string()));
                }
            }
        }
    }
}

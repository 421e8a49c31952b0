//! Operator input forwarding (send mode)
//!
//! Lines typed on standard input are written to the device from a secondary
//! thread. Each transmitted line is handed back to the primary thread over a
//! channel so it is printed and logged like device output.

use super::monitor::CancelFlag;
use colored::Colorize;
use std::io::{self, ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Upper bound on how long the forwarder waits for input before re-checking its flags
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A source of operator input lines
pub trait InputSource: Send {
    /// Wait up to `timeout` for a complete line.
    ///
    /// Returns `Ok(None)` when nothing is ready yet and an `UnexpectedEof`
    /// error once the input is exhausted.
    fn poll_line(&mut self, timeout: Duration) -> io::Result<Option<String>>;
}

/// Result of forwarding one input line
#[derive(Debug)]
pub enum SendStatus {
    Sent,
    /// Blank line, nothing transmitted
    Skipped,
    Failed(io::Error),
}

/// Strip the line terminator and re-terminate with `\n`; `None` for blank lines
pub fn prepare_payload(line: &str) -> Option<String> {
    let body = line.strip_suffix('\n').unwrap_or(line);
    let body = body.strip_suffix('\r').unwrap_or(body);
    if body.is_empty() {
        None
    } else {
        Some(format!("{}\n", body))
    }
}

/// Writes operator lines to the device and echoes them to the read loop
pub struct Forwarder<'a> {
    writer: Box<dyn Write + Send>,
    echo: Sender<String>,
    stop: &'a AtomicBool,
    cancel: CancelFlag,
}

impl<'a> Forwarder<'a> {
    pub fn new(
        writer: Box<dyn Write + Send>,
        echo: Sender<String>,
        stop: &'a AtomicBool,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            writer,
            echo,
            stop,
            cancel,
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }

    /// Forward lines until the session stops, the user cancels, or input ends
    pub fn run(mut self, input: &mut dyn InputSource) {
        while !self.should_stop() {
            match input.poll_line(POLL_INTERVAL) {
                Ok(Some(line)) => {
                    self.forward(&line);
                }
                Ok(None) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    log::debug!("Standard input closed, forwarder stopping");
                    break;
                }
                Err(e) => {
                    log::warn!("Failed to read standard input: {}", e);
                    break;
                }
            }
        }
    }

    /// Transmit one line; failures are reported and do not stop the forwarder
    pub fn forward(&mut self, line: &str) -> SendStatus {
        let Some(payload) = prepare_payload(line) else {
            return SendStatus::Skipped;
        };

        let written = self
            .writer
            .write_all(payload.as_bytes())
            .and_then(|_| self.writer.flush());

        match written {
            Ok(()) => {
                if self.echo.send(payload).is_err() {
                    log::debug!("Read loop gone, echo dropped");
                }
                SendStatus::Sent
            }
            Err(e) => {
                eprintln!("{} {}", "[TX ERROR]".red().bold(), e);
                log::warn!("Failed to send {:?}: {}", payload.trim_end(), e);
                SendStatus::Failed(e)
            }
        }
    }
}

/// Take the first complete line out of `pending`
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = pending.drain(..=end).collect();
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Standard input, polled with `poll(2)` so the forwarder never blocks indefinitely
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct StdinSource {
    pending: Vec<u8>,
    eof: bool,
}

#[cfg(unix)]
impl StdinSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&mut self) -> io::Result<Option<String>> {
        if self.pending.is_empty() {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "standard input closed"));
        }
        let rest = std::mem::take(&mut self.pending);
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

#[cfg(unix)]
impl InputSource for StdinSource {
    fn poll_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }
        if self.eof {
            return self.finish();
        }

        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `fds` is a valid pollfd for the duration of the call
        let ready = unsafe { libc::poll(&mut fds, 1, millis) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 1024];
        // SAFETY: `buf` is writable for `buf.len()` bytes
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }
        if n == 0 {
            self.eof = true;
            return self.finish();
        }

        self.pending.extend_from_slice(&buf[..n as usize]);
        Ok(take_line(&mut self.pending))
    }
}

/// Standard input read by a helper thread; lines arrive over a channel
#[cfg(not(unix))]
pub struct StdinSource {
    lines: std::sync::mpsc::Receiver<String>,
}

#[cfg(not(unix))]
impl StdinSource {
    pub fn new() -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { lines: rx }
    }
}

#[cfg(not(unix))]
impl InputSource for StdinSource {
    fn poll_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        use std::sync::mpsc::RecvTimeoutError;
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(ErrorKind::UnexpectedEof, "standard input closed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "device gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Yields its lines, then reports end of input
    struct Lines(VecDeque<String>);

    impl InputSource for Lines {
        fn poll_line(&mut self, _timeout: Duration) -> io::Result<Option<String>> {
            self.0
                .pop_front()
                .map(Some)
                .ok_or_else(|| io::Error::new(ErrorKind::UnexpectedEof, "done"))
        }
    }

    #[test]
    fn test_prepare_payload() {
        assert_eq!(prepare_payload("ping\n").as_deref(), Some("ping\n"));
        assert_eq!(prepare_payload("ping\r\n").as_deref(), Some("ping\n"));
        assert_eq!(prepare_payload("ping").as_deref(), Some("ping\n"));
        assert_eq!(prepare_payload("\n"), None);
        assert_eq!(prepare_payload(""), None);
    }

    #[test]
    fn test_take_line_keeps_remainder() {
        let mut pending = b"one\ntw".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some("one\n"));
        assert_eq!(take_line(&mut pending), None);
        assert_eq!(pending, b"tw");
    }

    #[test]
    fn test_run_sends_and_echoes_until_eof() {
        let device = Shared::default();
        let (tx, rx) = mpsc::channel();
        let stop = AtomicBool::new(false);
        let fwd = Forwarder::new(Box::new(device.clone()), tx, &stop, CancelFlag::new());

        let mut input = Lines(VecDeque::from(vec![
            "ping\n".to_string(),
            "\n".to_string(),
            "reset\r\n".to_string(),
        ]));
        fwd.run(&mut input);

        assert_eq!(device.0.lock().unwrap().as_slice(), b"ping\nreset\n");
        let echoed: Vec<String> = rx.try_iter().collect();
        assert_eq!(echoed, vec!["ping\n", "reset\n"]);
    }

    #[test]
    fn test_write_failure_is_reported_and_not_echoed() {
        let (tx, rx) = mpsc::channel();
        let stop = AtomicBool::new(false);
        let mut fwd = Forwarder::new(Box::new(Broken), tx, &stop, CancelFlag::new());

        assert!(matches!(fwd.forward("ping\n"), SendStatus::Failed(_)));
        assert!(matches!(fwd.forward("   \n"), SendStatus::Failed(_)));
        assert!(matches!(fwd.forward("\r\n"), SendStatus::Skipped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_flag_ends_run_without_reading() {
        let (tx, _rx) = mpsc::channel();
        let stop = AtomicBool::new(true);
        let fwd = Forwarder::new(Box::new(Shared::default()), tx, &stop, CancelFlag::new());

        let mut input = Lines(VecDeque::from(vec!["ping\n".to_string()]));
        fwd.run(&mut input);
        assert_eq!(input.0.len(), 1);
    }
}

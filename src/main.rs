//! Embedded Cereal Bowl
//!
//! Small utilities for embedded development workflows.
//!
//! # Features
//!
//! - **Serial Monitor**: Waits for a device, then prints and logs its output
//!   with optional timestamps, keyword highlighting and line sending
//!   (requires `serial` feature and libudev on Linux)
//! - **Port Listing**: Shows serial ports visible to the host
//! - **Formatter**: Runs clang-format / cmake-format over a tree in parallel,
//!   either checking or rewriting files
//!
//! # Usage
//!
//! ```bash
//! # Monitor /dev/ttyACM0 at 115200 baud
//! cereal-bowl monitor
//!
//! # Monitor with logging, timestamps and highlights
//! cereal-bowl monitor -p USB0 -b 921600 -l --log-file bench --print_time dt --highlight error,warn
//!
//! # Type lines to send them to the device
//! cereal-bowl monitor --send
//!
//! # List available serial ports
//! cereal-bowl ports
//!
//! # Check formatting, skipping build output
//! cereal-bowl format --check --ignore build
//! ```

#[cfg(feature = "serial")]
mod display;
mod format;
#[cfg(feature = "serial")]
mod serial;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use format::FormatOptions;

#[cfg(feature = "serial")]
use anyhow::Context;
#[cfg(feature = "serial")]
use display::{parse_keywords, TimestampMode};
#[cfg(feature = "serial")]
use serial::{CancelFlag, PortConfig, SerialConnector, SessionConfig, Supervisor};

/// Embedded Cereal Bowl
///
/// Serial monitor and source formatter for embedded development
#[derive(Parser)]
#[command(name = "cereal-bowl")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Serial monitor/logger and parallel source formatter for embedded development")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a serial device (requires --features serial)
    #[cfg(feature = "serial")]
    Monitor(MonitorArgs),

    /// List available serial ports (requires --features serial)
    #[cfg(feature = "serial")]
    Ports,

    /// Format or check source files in parallel
    Format(FormatArgs),
}

#[cfg(feature = "serial")]
#[derive(Args)]
struct MonitorArgs {
    /// Port id or path (e.g. ACM0, USB1, /dev/ttyS0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = serial::port::DEFAULT_BAUD)]
    baud: u32,

    /// Log output to a timestamped file
    #[arg(short, long)]
    log: bool,

    /// Base name appended to the log file timestamp
    #[arg(long, default_value = "")]
    log_file: String,

    /// Directory for log files (created if missing)
    #[arg(long, default_value = serial::logfile::DEFAULT_LOG_DIR)]
    log_directory: PathBuf,

    /// Clear the terminal before starting
    #[arg(short, long)]
    clear: bool,

    /// Timestamp prefix for each line
    #[arg(long = "print_time", visible_alias = "print-time", value_enum, default_value_t = TimestampMode::Off)]
    print_time: TimestampMode,

    /// Comma separated keywords to highlight (e.g. error,warn)
    #[arg(long)]
    highlight: Option<String>,

    /// Forward lines typed on stdin to the device
    #[arg(long)]
    send: bool,
}

#[derive(Args)]
struct FormatArgs {
    /// Root directory to scan
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Directories to ignore, relative to ROOT or absolute
    #[arg(short, long, num_args = 1..)]
    ignore: Vec<String>,

    /// Number of concurrent jobs (default: available cores)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Report required changes instead of rewriting files
    #[arg(short, long)]
    check: bool,

    /// TOML file with [[formatter]] entries replacing the built-in table
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        #[cfg(feature = "serial")]
        Commands::Monitor(args) => handle_monitor(args),
        #[cfg(feature = "serial")]
        Commands::Ports => {
            serial::port::print_ports()?;
            Ok(0)
        }
        Commands::Format(args) => handle_format(args, cli.verbose),
    }
}

#[cfg(feature = "serial")]
fn handle_monitor(args: MonitorArgs) -> Result<i32> {
    use crossterm::{cursor::MoveTo, execute, terminal};
    use std::io;

    let port = args
        .port
        .unwrap_or_else(|| serial::port::default_port().to_string());
    let keywords = args
        .highlight
        .as_deref()
        .map(parse_keywords)
        .unwrap_or_default();

    let mut config = SessionConfig::new(&serial::port::resolve_device_path(&port))
        .with_baud_rate(args.baud)
        .with_timestamp(args.print_time)
        .with_highlight(keywords)
        .with_send(args.send)
        .with_clear(args.clear);
    if args.log {
        config = config.with_logging(args.log_directory, &args.log_file);
    }
    log::debug!("Session: {:?}", config);

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.cancel()).context("Failed to set Ctrl+C handler")?;

    let stdout = io::stdout();
    let mut console = stdout.lock();
    if config.clear {
        execute!(console, terminal::Clear(terminal::ClearType::All), MoveTo(0, 0))
            .context("Failed to clear terminal")?;
    }

    let mut sink = config.open_log(&chrono::Local::now())?;
    let connector = SerialConnector::new(PortConfig::from_session(&config));
    let mut supervisor = Supervisor::new(&config, connector, cancel)?;

    let mut stdin = config.open_input();
    let input = stdin
        .as_mut()
        .map(|source| source as &mut dyn serial::forwarder::InputSource);

    let outcome = supervisor.run(&mut console, sink.as_mut(), input)?;
    Ok(outcome.exit_code())
}

fn handle_format(args: FormatArgs, verbose: bool) -> Result<i32> {
    let mut options = FormatOptions::new(args.root);
    options.ignore = args.ignore;
    options.jobs = args.jobs;
    options.check = args.check;
    options.verbose = verbose;
    options.config = args.config;
    format::run(&options)
}

//! Serial port configuration, opening and discovery

use super::monitor::{Connector, SessionConfig, Transport};
use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Default baud rate for the monitor
pub const DEFAULT_BAUD: u32 = 115200;

/// Port identifier used when `--port` is not given
pub fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else {
        "ACM0"
    }
}

/// Turn a short port id into a device path.
///
/// `ACM0` becomes `/dev/ttyACM0`; absolute paths are kept. Windows names such
/// as `COM3` are used as given.
pub fn resolve_device_path(id: &str) -> String {
    if cfg!(windows) || Path::new(id).is_absolute() {
        id.to_string()
    } else {
        format!("/dev/tty{}", id)
    }
}

/// Configuration for opening a serial port (8N1, no flow control by default)
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Device path (e.g., /dev/ttyACM0, COM3)
    pub port_path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: resolve_device_path(default_port()),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_millis(50),
        }
    }
}

impl PortConfig {
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Port settings for a monitor session
    pub fn from_session(session: &SessionConfig) -> Self {
        Self::new(&session.device)
            .with_baud_rate(session.baud_rate)
            .with_timeout(session.read_timeout)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the port with these settings
    pub fn open(&self) -> serialport::Result<Box<dyn SerialPort>> {
        serialport::new(&self.port_path, self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .flow_control(self.flow_control)
            .timeout(self.timeout)
            .open()
    }
}

/// An open serial port
pub struct SerialTransport(Box<dyn SerialPort>);

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Transport for SerialTransport {
    fn writer(&self) -> io::Result<Box<dyn Write + Send>> {
        let clone = self.0.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(clone))
    }
}

/// Opens the configured port for the monitor supervisor
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: PortConfig,
}

impl SerialConnector {
    pub fn new(config: PortConfig) -> Self {
        Self { config }
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> io::Result<Box<dyn Transport>> {
        let port = self.config.open().map_err(io::Error::from)?;
        log::debug!(
            "Opened {} at {} baud",
            self.config.port_path,
            self.config.baud_rate
        );
        Ok(Box::new(SerialTransport(port)))
    }

    fn describe(&self) -> &str {
        &self.config.port_path
    }
}

/// Short id accepted by `monitor -p` for a device path (`/dev/ttyACM0` -> `ACM0`)
pub fn port_id(path: &str) -> &str {
    path.strip_prefix("/dev/tty")
        .filter(|id| !id.is_empty())
        .unwrap_or(path)
}

/// A detected serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub path: String,
    /// `vid:pid product` for USB adapters, the bus kind otherwise
    pub description: String,
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let description = match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                let mut text = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
                for part in [usb.manufacturer, usb.product].into_iter().flatten() {
                    text.push(' ');
                    text.push_str(&part);
                }
                text
            }
            serialport::SerialPortType::PciPort => "PCI".to_string(),
            serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            serialport::SerialPortType::Unknown => String::new(),
        };
        PortInfo {
            path: p.port_name,
            description,
        }
    }
}

/// List all available serial ports, sorted by path
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    let mut infos: Vec<PortInfo> = ports.into_iter().map(PortInfo::from).collect();
    infos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(infos)
}

/// One line per port: the id to pass to `monitor -p`, the path and a description
pub fn write_ports<W: Write>(out: &mut W, ports: &[PortInfo]) -> io::Result<()> {
    if ports.is_empty() {
        writeln!(out, "{}", "No serial ports found".yellow())?;
        return Ok(());
    }

    let width = ports.iter().map(|p| port_id(&p.path).len()).max().unwrap_or(0);
    for port in ports {
        let id = format!("{:<width$}", port_id(&port.path), width = width);
        writeln!(
            out,
            "  {}  {}  {}",
            id.cyan().bold(),
            port.path,
            port.description.dimmed()
        )?;
    }
    writeln!(out, "{}", "Use: cereal-bowl monitor -p <ID>".yellow())
}

/// Print the detected ports to stdout
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;
    let stdout = io::stdout();
    write_ports(&mut stdout.lock(), &ports).context("Failed to print port list")
}

//! Serial port monitoring
//!
//! This module provides functionality for:
//! - Listing available serial ports
//! - Monitoring a device with reconnect-until-present and timestamped output
//! - Logging sessions to timestamped files
//! - Forwarding typed lines to the device

pub mod forwarder;
pub mod line;
pub mod logfile;
pub mod monitor;
pub mod port;

pub use monitor::{CancelFlag, SessionConfig, Supervisor};
pub use port::{PortConfig, SerialConnector};

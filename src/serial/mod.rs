//! # Serial Communication Module
//!
//! Byte-stream transport between the CRSF receiver and this process.
//!
//! This module handles:
//! - Opening the serial port 8N1 at the configured baud rate (420,000 by default)
//! - Falling back to common device paths when the configured one is missing
//! - Splitting the port into independent read and write halves so the
//!   receive loop and the telemetry loop can run as separate tasks

pub mod port_trait;

use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{CrsfError, Result};
pub use port_trait::{SerialPortIO, SerialPortRead, SerialReader, SerialWriter};

/// CRSF baud rate (420,000 baud)
pub const CRSF_BAUD_RATE: u32 = 420_000;

/// Device paths tried after the configured one (in order of preference)
const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/serial0", // Raspberry Pi UART
];

/// Receiver-side half of an opened port
pub type PortReader = SerialReader<ReadHalf<SerialStream>>;

/// Telemetry-side half of an opened port
pub type PortWriter = SerialWriter<WriteHalf<SerialStream>>;

/// CRSF Serial Port Handler
pub struct CrsfSerial {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
    /// How long a read waits before reporting "nothing available"
    read_timeout: Duration,
}

impl std::fmt::Debug for CrsfSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsfSerial")
            .field("device_path", &self.device_path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl CrsfSerial {
    /// Open the port described by `config`
    ///
    /// The configured path is tried first, then the usual device paths.
    ///
    /// # Errors
    ///
    /// Returns [`CrsfError::SerialPortNotFound`] if no candidate opens
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_link::config::Config;
    /// use crsf_link::serial::CrsfSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let config = Config::default();
    ///     let serial = CrsfSerial::open(&config.serial)?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut paths = vec![config.port.as_str()];
        if config.fallback {
            paths.extend(
                FALLBACK_DEVICE_PATHS
                    .iter()
                    .copied()
                    .filter(|p| *p != config.port),
            );
        }

        Self::open_with_paths(
            &paths,
            config.baud_rate,
            Duration::from_millis(config.read_timeout_ms),
        )
    }

    /// Open the first of `paths` that works
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened CRSF serial port at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        read_timeout,
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(CrsfError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with CRSF settings (8N1, no flow control)
    fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| CrsfError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into a reader for the receive loop and a writer for telemetry
    pub fn split(self) -> (PortReader, PortWriter) {
        let (read_half, write_half) = tokio::io::split(self.port);
        (
            SerialReader::new(read_half, self.read_timeout),
            SerialWriter::new(write_half),
        )
    }
}

//! # Error Types
//!
//! Custom error types for CRSF Link using `thiserror`.
//!
//! Nothing on the receive path is fatal: framing and integrity failures are
//! absorbed by the reassembler, and decode-shape failures are turned into
//! "keep the previous record" by [`crate::link::CrsfLink`].

use thiserror::Error;

/// Main error type for CRSF Link
#[derive(Debug, Error)]
pub enum CrsfError {
    /// CRSF protocol errors
    #[error("CRSF protocol error: {0}")]
    CrsfProtocol(String),

    /// Type byte that is not one of the known frame types
    #[error("Unknown CRSF frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// Destination byte that is not one of the known destinations
    #[error("Unknown CRSF destination: 0x{0:02X}")]
    UnknownDestination(u8),

    /// Payload of a known frame type with the wrong size
    #[error("{kind} payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for CRSF Link
pub type Result<T> = std::result::Result<T, CrsfError>;

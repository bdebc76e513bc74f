//! # Error Types
//!
//! Custom error types for RC Link using `thiserror`.

use thiserror::Error;

use crate::packet::frame::PacketType;

/// Main error type for RC Link
#[derive(Debug, Error)]
pub enum RcLinkError {
    /// Caller passed a misshaped argument or used an operation outside its role
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Transceiver-level timeout
    #[error("Transceiver timed out")]
    Timeout,

    /// Nothing pending at the transceiver
    #[error("No data available")]
    NoData,

    /// Recomputed checksum does not match the stored one
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumFailure { expected: u8, actual: u8 },

    /// Frame carries a different protocol version
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// Declared payload length exceeds frame capacity
    #[error("Declared payload length {len} exceeds maximum {max}")]
    PayloadLengthOutOfRange { len: u8, max: usize },

    /// Type byte outside the packet type enumeration
    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// Valid frame of a type the caller did not ask for
    #[error("Unexpected packet type: expected {expected:?}, got {actual:?}")]
    UnexpectedPacketType {
        expected: PacketType,
        actual: PacketType,
    },

    /// Valid frame whose payload length differs from the caller's expectation
    #[error("Payload length mismatch: expected {expected} bytes, got {actual}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Transceiver reported a failure
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Session has been deinitialized
    #[error("Link not initialized")]
    NotInitialized,

    /// Payload does not fit into a frame
    #[error("Payload size {len} exceeds maximum {max}")]
    PacketTooLarge { len: usize, max: usize },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No radio bridge found (tried: {0})")]
    SerialPortNotFound(String),
}

impl RcLinkError {
    /// `true` for the normal "nothing to receive" polling outcome
    pub fn is_no_data(&self) -> bool {
        matches!(self, RcLinkError::NoData)
    }

    /// `true` for errors caused by a frame that failed validation or decoding
    pub fn is_frame_rejection(&self) -> bool {
        matches!(
            self,
            RcLinkError::ChecksumFailure { .. }
                | RcLinkError::VersionMismatch { .. }
                | RcLinkError::PayloadLengthOutOfRange { .. }
                | RcLinkError::UnknownPacketType(_)
                | RcLinkError::UnexpectedPacketType { .. }
                | RcLinkError::PayloadLengthMismatch { .. }
        )
    }
}

/// Result type alias for RC Link
pub type Result<T> = std::result::Result<T, RcLinkError>;

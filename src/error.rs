//! Error types for rover protocol operations.

use thiserror::Error;

/// Result type alias for rover operations.
pub type Result<T> = std::result::Result<T, RoverError>;

/// Error types for rover communication.
#[derive(Error, Debug)]
pub enum RoverError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No answer from the rover in time
    #[error("Communication timeout")]
    Timeout,

    /// `open()` called on a channel that is already open
    #[error("Channel already open")]
    AlreadyOpen,

    /// Operation needs an open channel
    #[error("Channel not open")]
    NotOpen,

    /// Channel was closed, either before the call or while it was waiting
    #[error("Channel closed")]
    ChannelClosed,

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

//! Error types for a3s-gate

use thiserror::Error;

/// Errors that can occur while handling gate commands
#[derive(Debug, Error)]
pub enum GateError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message body could not be decoded into a command
    #[error("Failed to decode message body: {0}")]
    Decode(String),

    /// Side value that maps to no relay channel
    #[error("Unknown relay side '{0}'")]
    UnknownSide(String),

    /// GPIO driver failure
    #[error("GPIO error on channel {channel}: {reason}")]
    Gpio {
        channel: u32,
        reason: String,
    },

    /// External capture tool failure
    #[error("Capture error: {0}")]
    Capture(String),

    /// Object storage upload failure
    #[error("Failed to store object '{key}': {reason}")]
    Storage {
        key: String,
        reason: String,
    },

    /// Queue receive/delete failure
    #[error("Queue error: {0}")]
    Queue(String),
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

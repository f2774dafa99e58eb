//! Error types for the modem engine.

use std::io;

use anynet_at_protocol::ProtocolError;
use thiserror::Error;

/// Errors returned by modem operations.
#[derive(Debug, Error)]
pub enum ModemError {
    /// The modem answered, but not with a well-formed response.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The modem completed the command with `ERROR` or `SEND FAIL`.
    #[error("command {command} failed")]
    CommandFailed { command: String },

    /// The socket index already hosts a channel of this direction.
    #[error("{kind} channel index {index} is already in use")]
    ChannelInUse { kind: &'static str, index: u8 },

    /// The modem rejected a channel open or close.
    #[error("{kind} channel operation on index {index} failed")]
    ChannelError { kind: &'static str, index: u8 },

    /// A channel index outside the configured slots was requested.
    #[error("channel index {index} out of range (modem has {slots} slots)")]
    InvalidChannel { index: u8, slots: u8 },

    /// Unknown publish or subscribe mode selector.
    #[error("invalid mode selector: {0}")]
    InvalidMode(u8),

    /// No answer within the configured timeout.
    #[error("timeout waiting for {command}")]
    Timeout { command: String },

    /// The reader stopped; the modem link is gone.
    #[error("modem link disconnected")]
    Disconnected,

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error on the modem link.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for modem operations.
pub type ModemResult<T> = Result<T, ModemError>;

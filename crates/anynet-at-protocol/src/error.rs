//! Error types for the AT protocol.

use thiserror::Error;

/// Errors raised while parsing modem responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A response carried the wrong number of fields.
    #[error("expected {expected} field(s), got {actual}")]
    FieldCount { expected: usize, actual: usize },

    /// A field could not be parsed as the expected type.
    #[error("malformed field {field:?}: {reason}")]
    MalformedField { field: String, reason: String },

    /// The modem reported a state code outside the known range.
    #[error("unknown modem state code: {0}")]
    UnknownState(i64),

    /// A `+AWS:` delivery notification did not carry `slot,length`.
    #[error("malformed delivery header: {0}")]
    BadDeliveryHeader(String),

    /// An open-channel listing entry was not `index:"topic/thing"`.
    #[error("malformed open channel entry: {0}")]
    BadChannelEntry(String),
}

/// Result type alias for protocol parsing.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

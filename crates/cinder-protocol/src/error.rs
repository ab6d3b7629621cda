//! Protocol error types.

use thiserror::Error;

/// Errors from parsing the wire format or interpreting a command frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The input buffer doesn't contain a complete frame yet.
    /// The caller should read more data and try again.
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a frame didn't match any known type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer value from the frame content.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared an invalid length.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string exceeded the maximum allowed size.
    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// Arrays nested deeper than the parser allows.
    #[error("nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),

    /// An array declared more elements than the parser allows.
    #[error("too many elements: {0}")]
    TooManyElements(usize),

    /// A frame parsed but couldn't be interpreted as a command.
    #[error("{0}")]
    InvalidCommandFrame(String),

    /// A command was given the wrong number of arguments.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),
}

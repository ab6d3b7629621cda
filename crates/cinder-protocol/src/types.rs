//! RESP2 frame types.
//!
//! The [`Frame`] enum represents a single parsed protocol value. Bulk
//! strings use `Bytes` for reference-counted storage that avoids
//! copies when moving data through the pipeline.

use bytes::Bytes;

/// A single RESP2 protocol frame.
///
/// Requests from clients are always arrays of bulk strings; replies
/// use the full set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string reply, e.g. `+OK\r\n`.
    Simple(String),

    /// Error reply, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Ordered array of frames, e.g. `*2\r\n+a\r\n+b\r\n`.
    Array(Vec<Frame>),

    /// Null bulk string, `$-1\r\n`. The reply for absent values.
    Null,

    /// Null array, `*-1\r\n`.
    NullArray,
}

impl Frame {
    /// Returns `true` for either null form.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::NullArray)
    }

    /// Builds a bulk frame from a string slice.
    pub fn bulk(data: impl AsRef<[u8]>) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(data.as_ref()))
    }
}

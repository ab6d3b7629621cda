//! cinder-protocol: RESP2 wire protocol implementation.
//!
//! Provides incremental parsing and direct-to-buffer serialization of
//! the length-prefixed reply grammar, plus conversion of request
//! frames into typed commands.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use cinder_protocol::{parse_frame, Frame};
//!
//! let input = b"+OK\r\n";
//! let (frame, consumed) = parse_frame(input).unwrap().unwrap();
//! assert_eq!(frame, Frame::Simple("OK".into()));
//! assert_eq!(consumed, input.len());
//!
//! let mut buf = BytesMut::new();
//! frame.serialize(&mut buf);
//! assert_eq!(&buf[..], b"+OK\r\n");
//! ```

pub mod command;
pub mod error;
pub mod parse;
mod serialize;
pub mod types;

pub use command::{Command, SetExpire};
pub use error::ProtocolError;
pub use parse::parse_frame;
pub use types::Frame;

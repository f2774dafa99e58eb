//! AnyNet AWS AT Protocol
//!
//! This crate provides the wire format for talking to the AnyNet AWS IoT modem
//! over its serial AT command interface. It has no threads and no state beyond
//! the buffered reader: classification of frames and correlation with waiting
//! callers live in `anynet-modem`.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → modem): `AT+<NAME>[?][=<arg1>,<arg2>,...]\r\n`
//! - **Completion codes** (modem → host): `OK`, `ERROR`, `SEND OK`, `SEND FAIL`
//! - **Command responses**: lines prefixed `+<NAME>:` while the command is in flight
//! - **Deliveries**: `+AWS:<slot>,<length>\r\n` followed by `<length>` raw bytes
//! - **Other notifications**: `+<NAME>:<comma separated fields>\r\n`
//! - **Prompt**: a single `>` byte, the modem is ready for a payload
//! - **Echo**: the modem echoes every command line back
//!
//! # Example
//!
//! ```rust
//! use anynet_at_protocol::{Command, Frame};
//!
//! let cmd = Command::pub_open(0, "devices");
//! assert_eq!(cmd.encode(), b"AT+AWSPUBOPEN=0,\"devices\"\r\n");
//!
//! assert_eq!(Frame::classify(b"SEND OK\r\n"), Frame::Success);
//! ```

mod codec;
mod commands;
mod error;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;

//! Frame reading and classification for the AT link.
//!
//! The modem multiplexes command echoes, completion codes, command output,
//! asynchronous notifications, raw payloads and the payload prompt onto one
//! byte stream. [`FrameReader`] cuts the stream into frames and
//! [`Frame::classify`] gives each frame its state-free category. Deciding
//! which waiting caller a frame belongs to is left to the engine.

use std::io::{self, BufRead, Read};

use bytes::{Bytes, BytesMut};

/// Prefix of every command line.
pub const COMMAND_PREFIX: &str = "AT+";

/// Line terminator for commands and responses.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Marker that starts command responses and notifications.
pub const RESPONSE_MARKER: u8 = b'+';

/// Prompt byte sent when the modem is ready for a payload.
pub const PROMPT: u8 = b'>';

/// Line noise occasionally seen before a frame.
const NUL: u8 = 0;

/// Largest payload buffered for a subscriber (the AWS IoT message size limit).
///
/// Longer deliveries are skipped with [`FrameReader::discard`].
pub const MAX_PAYLOAD_LENGTH: usize = 128 * 1024;

/// Encode a command line.
///
/// `query` appends `?`, `args` appends `=` and the comma joined arguments.
/// String arguments must already be quoted.
pub fn encode_command(name: &str, query: bool, args: Option<&[String]>) -> Vec<u8> {
    let mut line = String::with_capacity(COMMAND_PREFIX.len() + name.len() + 16);
    line.push_str(COMMAND_PREFIX);
    line.push_str(name);
    if query {
        line.push('?');
    }
    if let Some(args) = args {
        line.push('=');
        line.push_str(&args.join(","));
    }
    let mut buf = line.into_bytes();
    buf.extend_from_slice(LINE_TERMINATOR);
    buf
}

/// Category of one inbound frame, before any correlation state is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Bare line terminator (keep-alive or noise).
    Empty,
    /// Command line echoed back by the modem.
    Echo,
    /// `OK` or `SEND OK`.
    Success,
    /// `ERROR` or `SEND FAIL`.
    Failure,
    /// A `+`-prefixed line, without the `+` and the terminator.
    Prefixed(String),
    /// The payload prompt.
    Prompt,
    /// Any other line, without the terminator.
    Line(String),
}

impl Frame {
    /// Classify a raw frame as returned by [`FrameReader::next_frame`].
    pub fn classify(raw: &[u8]) -> Frame {
        if raw == b"\r\n" || raw == b"\r\r\n" {
            return Frame::Empty;
        }
        if raw.starts_with(COMMAND_PREFIX.as_bytes()) {
            return Frame::Echo;
        }
        if raw == [PROMPT] {
            return Frame::Prompt;
        }

        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\r', '\n']);
        match text {
            "OK" | "SEND OK" => Frame::Success,
            "ERROR" | "SEND FAIL" => Frame::Failure,
            _ => match text.strip_prefix(RESPONSE_MARKER as char) {
                Some(rest) => Frame::Prefixed(rest.to_string()),
                None => Frame::Line(text.to_string()),
            },
        }
    }

    /// Strip `NAME:` from the text of a prefixed frame.
    ///
    /// Returns the remainder with leading blanks removed, or `None` if the
    /// frame belongs to a different name.
    pub fn strip_name<'a>(text: &'a str, name: &str) -> Option<&'a str> {
        text.strip_prefix(name)?
            .strip_prefix(':')
            .map(|rest| rest.trim_start_matches(' '))
    }
}

/// Cuts a buffered byte stream into frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: BufRead> FrameReader<R> {
    /// Wrap a buffered reader.
    pub fn new(inner: R) -> Self {
        FrameReader { inner }
    }

    /// Read the next frame.
    ///
    /// Leading NUL bytes are skipped. A prompt byte is a frame on its own,
    /// anything else is read through the next `\n`.
    pub fn next_frame(&mut self) -> io::Result<Vec<u8>> {
        let mut first = [0u8; 1];
        loop {
            self.inner.read_exact(&mut first)?;
            if first[0] != NUL {
                break;
            }
        }

        let mut frame = vec![first[0]];
        if first[0] != PROMPT {
            self.inner.read_until(b'\n', &mut frame)?;
        }
        Ok(frame)
    }

    /// Read exactly `len` raw bytes following a delivery header.
    pub fn read_payload(&mut self, len: usize) -> io::Result<Bytes> {
        if len > MAX_PAYLOAD_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("payload length {} exceeds {}", len, MAX_PAYLOAD_LENGTH),
            ));
        }
        let mut payload = BytesMut::zeroed(len);
        self.inner.read_exact(&mut payload)?;
        Ok(payload.freeze())
    }

    /// Skip `len` raw bytes without buffering them.
    pub fn discard(&mut self, len: usize) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
        if skipped < len as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ended after {} of {} bytes", skipped, len),
            ));
        }
        Ok(())
    }
}

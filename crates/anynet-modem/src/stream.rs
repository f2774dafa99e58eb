//! Byte stream drivers.
//!
//! The engine needs a duplex byte channel split into a read half, owned by
//! the reader thread, and a write half shared by callers. Serial port setup
//! is left to the driver.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use tracing::debug;

/// Read half of a modem link.
pub type StreamReader = Box<dyn Read + Send>;

/// Write half of a modem link.
pub type StreamWriter = Box<dyn Write + Send>;

/// Opens a link to the modem.
pub trait StreamDriver {
    /// Open the link at the given baud rate and split it into halves.
    fn open(&self, baud: u32) -> io::Result<(StreamReader, StreamWriter)>;
}

/// Reaches the modem through a TCP serial bridge.
///
/// The bridge owns the physical UART, so the baud rate is only logged.
#[derive(Debug, Clone)]
pub struct TcpDriver {
    addr: String,
}

impl TcpDriver {
    /// Create a driver for a `host:port` bridge address.
    pub fn new(addr: impl Into<String>) -> Self {
        TcpDriver { addr: addr.into() }
    }
}

impl StreamDriver for TcpDriver {
    fn open(&self, baud: u32) -> io::Result<(StreamReader, StreamWriter)> {
        let stream = TcpStream::connect(&self.addr)?;
        stream.set_nodelay(true)?;
        debug!("Connected to serial bridge {} (baud {})", self.addr, baud);
        let reader = stream.try_clone()?;
        Ok((Box::new(reader), Box::new(stream)))
    }
}

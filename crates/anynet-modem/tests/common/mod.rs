//! Scripted fake modem over an in-memory pipe.

#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anynet_modem::{Modem, ModemConfig, StreamDriver, StreamReader, StreamWriter};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

// ============================================================================
// Pipe
// ============================================================================

/// Read half of an in-memory pipe. Reads return EOF once every sender is gone.
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl PipeReader {
    /// Whether bytes have been written that are not read yet.
    fn has_pending(&self) -> bool {
        self.pos < self.pending.len() || !self.rx.is_empty()
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Write half of an in-memory pipe.
#[derive(Clone)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (PipeWriter { tx }, PipeReader { rx, pending: Vec::new(), pos: 0 })
}

// ============================================================================
// Fake modem
// ============================================================================

/// Produces the modem's answer to one command line (without `\r\n`).
pub type Responder = Box<dyn FnMut(&str) -> Vec<u8> + Send>;

/// A modem that echoes each command and answers from a script.
///
/// `AT+AWSPUBLISH=<i>,<len>,<qos>` is answered with the prompt, the payload
/// is read and recorded, then the script's answer is sent.
pub struct FakeModem {
    commands: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    peak_in_flight: Arc<AtomicUsize>,
    to_host: Mutex<Option<PipeWriter>>,
}

impl FakeModem {
    /// Start the fake modem, returning it with the host side of the link.
    pub fn start(responder: impl FnMut(&str) -> Vec<u8> + Send + 'static) -> (FakeModem, PipeReader, PipeWriter) {
        FakeModem::start_with_delay(Duration::ZERO, responder)
    }

    /// Like [`FakeModem::start`], holding every answer back for `delay`.
    ///
    /// Before answering, the modem checks whether the host already sent more
    /// input, which would mean a second command was in flight.
    pub fn start_with_delay(
        delay: Duration,
        responder: impl FnMut(&str) -> Vec<u8> + Send + 'static,
    ) -> (FakeModem, PipeReader, PipeWriter) {
        let (host_tx, modem_rx) = pipe();
        let (modem_tx, host_rx) = pipe();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let payloads = Arc::new(Mutex::new(Vec::new()));

        let mut responder: Responder = Box::new(responder);
        let mut out = modem_tx.clone();
        let peak_in_flight = Arc::new(AtomicUsize::new(0));
        let (seen, published, peak) = (commands.clone(), payloads.clone(), peak_in_flight.clone());
        thread::spawn(move || {
            let mut input = BufReader::new(modem_rx);
            loop {
                let mut line = String::new();
                match input.read_line(&mut line) {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                let command = line.trim_end().to_string();
                seen.lock().push(command.clone());
                if out.write_all(line.as_bytes()).is_err() {
                    return;
                }

                if let Some(len) = publish_length(&command) {
                    let mut payload = vec![0u8; len];
                    if out.write_all(b">").is_err() || input.read_exact(&mut payload).is_err() {
                        return;
                    }
                    published.lock().push(payload);
                }

                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                let queued = !input.buffer().is_empty() || input.get_ref().has_pending();
                peak.fetch_max(1 + usize::from(queued), Ordering::SeqCst);

                let answer = responder(&command);
                if !answer.is_empty() && out.write_all(&answer).is_err() {
                    return;
                }
            }
        });

        let fake = FakeModem {
            commands,
            payloads,
            peak_in_flight,
            to_host: Mutex::new(Some(modem_tx)),
        };
        (fake, host_rx, host_tx)
    }

    /// Start the fake modem and an engine connected to it.
    pub fn connect(responder: impl FnMut(&str) -> Vec<u8> + Send + 'static) -> (FakeModem, Modem) {
        let (fake, reader, writer) = FakeModem::start(responder);
        let modem = Modem::from_stream(reader, writer, test_config()).expect("engine starts");
        (fake, modem)
    }

    /// Start a delayed fake modem and an engine connected to it.
    pub fn connect_with_delay(
        delay: Duration,
        responder: impl FnMut(&str) -> Vec<u8> + Send + 'static,
    ) -> (FakeModem, Modem) {
        let (fake, reader, writer) = FakeModem::start_with_delay(delay, responder);
        let modem = Modem::from_stream(reader, writer, test_config()).expect("engine starts");
        (fake, modem)
    }

    /// Most commands ever outstanding at once, as seen by the modem.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Command lines received so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Payloads received after a publish prompt.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }

    /// Send unsolicited bytes to the host.
    pub fn inject(&self, data: &[u8]) {
        if let Some(out) = self.to_host.lock().as_mut() {
            out.write_all(data).expect("host side open");
        }
    }
}

fn publish_length(command: &str) -> Option<usize> {
    let args = command.strip_prefix("AT+AWSPUBLISH=")?;
    args.split(',').nth(1)?.parse().ok()
}

/// Config with timeouts so a broken test fails instead of hanging.
pub fn test_config() -> ModemConfig {
    ModemConfig {
        command_timeout_ms: Some(3000),
        urc_timeout_ms: Some(3000),
        ..ModemConfig::default()
    }
}

/// Join response lines into one answer.
pub fn lines(lines: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Driver handing out a pre-built pipe pair once.
pub struct PipeDriver {
    halves: Mutex<Option<(PipeReader, PipeWriter)>>,
    pub baud: Mutex<Option<u32>>,
}

impl PipeDriver {
    pub fn new(reader: PipeReader, writer: PipeWriter) -> Self {
        PipeDriver {
            halves: Mutex::new(Some((reader, writer))),
            baud: Mutex::new(None),
        }
    }
}

impl StreamDriver for PipeDriver {
    fn open(&self, baud: u32) -> io::Result<(StreamReader, StreamWriter)> {
        *self.baud.lock() = Some(baud);
        let (reader, writer) = self
            .halves
            .lock()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "already opened"))?;
        Ok((Box::new(reader), Box::new(writer)))
    }
}

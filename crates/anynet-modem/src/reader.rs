//! Background reader.
//!
//! One thread reads every frame the modem sends and routes it to the command
//! in flight, the awaited acknowledgement or a subscription callback. The
//! routing order is fixed:
//!
//! 1. noise and command echoes are skipped
//! 2. completion codes go to the command in flight
//! 3. `+`-prefixed lines go to the command in flight if the name matches,
//!    otherwise deliveries (`+AWS:`) go to subscriptions, otherwise the
//!    awaited acknowledgement is offered the line
//! 4. the prompt writes the pending payload
//! 5. any other line is response body of the command in flight
//!
//! Frames nothing is waiting for are dropped.

use std::io::{self, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anynet_at_protocol::{Delivery, Frame, FrameReader, MAX_PAYLOAD_LENGTH};
use anynet_metrics::metric_defs;
use tracing::{debug, trace, warn};

use crate::correlator::CompletionCode;
use crate::Engine;

fn category(frame: &Frame) -> &'static str {
    match frame {
        Frame::Empty => "empty",
        Frame::Echo => "echo",
        Frame::Success => "success",
        Frame::Failure => "failure",
        Frame::Prefixed(_) => "prefixed",
        Frame::Prompt => "prompt",
        Frame::Line(_) => "line",
    }
}

/// Routes frames from the modem to their waiting callers.
pub(crate) struct FrameRouter<R> {
    frames: FrameReader<BufReader<R>>,
    engine: Arc<Engine>,
}

impl<R: Read> FrameRouter<R> {
    pub(crate) fn new(reader: R, engine: Arc<Engine>) -> Self {
        FrameRouter {
            frames: FrameReader::new(BufReader::new(reader)),
            engine,
        }
    }

    /// Route frames until the stream fails.
    pub(crate) fn run(mut self) {
        loop {
            if let Err(e) = self.step() {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    debug!("Modem link closed");
                } else {
                    warn!("Modem link failed: {}", e);
                }
                self.engine.disconnect();
                return;
            }
        }
    }

    /// Read and route one frame.
    pub(crate) fn step(&mut self) -> io::Result<()> {
        let raw = self.frames.next_frame()?;
        let frame = Frame::classify(&raw);
        trace!("Frame {:?}", frame);
        metrics::counter!(metric_defs::FRAMES_RECEIVED.name, "category" => category(&frame))
            .increment(1);
        self.route(frame)
    }

    fn route(&mut self, frame: Frame) -> io::Result<()> {
        let engine = Arc::clone(&self.engine);
        let commands = &engine.commands;
        let routed = match &frame {
            Frame::Empty | Frame::Echo => true,
            Frame::Success => commands.complete(CompletionCode::Success),
            Frame::Failure => commands.complete(CompletionCode::Failure),
            Frame::Prefixed(text) => self.route_prefixed(text)?,
            Frame::Prompt => match commands.take_prompt() {
                Some(payload) => {
                    commands.write_payload(&payload)?;
                    true
                }
                None => commands.append_line(">"),
            },
            Frame::Line(text) => commands.append_line(text),
        };

        if !routed {
            debug!("Dropping unexpected frame {:?}", frame);
            metrics::counter!(metric_defs::FRAMES_DROPPED.name, "category" => category(&frame))
                .increment(1);
        }
        Ok(())
    }

    fn route_prefixed(&mut self, text: &str) -> io::Result<bool> {
        if self.engine.commands.append_prefixed(text) {
            return Ok(true);
        }

        match Delivery::parse_header(text) {
            Ok(Some(delivery)) if delivery.len > MAX_PAYLOAD_LENGTH => {
                self.frames.discard(delivery.len)?;
                warn!(
                    "Dropping {} byte delivery on slot {}: larger than {} bytes",
                    delivery.len, delivery.slot, MAX_PAYLOAD_LENGTH
                );
                return Ok(false);
            }
            Ok(Some(delivery)) => {
                let payload = self.frames.read_payload(delivery.len)?;
                trace!("Delivery of {} bytes on slot {}", payload.len(), delivery.slot);
                if self.engine.subscriptions.dispatch(delivery.slot, &payload) {
                    metrics::counter!(metric_defs::DELIVERIES.name, "slot" => delivery.slot.to_string())
                        .increment(1);
                    metrics::counter!(metric_defs::DELIVERED_BYTES.name)
                        .increment(payload.len() as u64);
                } else {
                    warn!(
                        "Dropping {} byte delivery: no subscription on slot {}",
                        payload.len(),
                        delivery.slot
                    );
                }
                return Ok(true);
            }
            Ok(None) => {}
            Err(e) => {
                // Keep the stream framed if the length is still readable.
                if let Some(len) = Delivery::announced_len(text) {
                    self.frames.discard(len)?;
                }
                warn!("{}", e);
                return Ok(false);
            }
        }

        Ok(self.engine.urcs.offer(text))
    }
}

/// Start the reader thread.
pub(crate) fn spawn_reader<R>(reader: R, engine: Arc<Engine>) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("anynet-reader".to_string())
        .spawn(move || FrameRouter::new(reader, engine).run())
}

//! Blocking command exchanges.
//!
//! One command is in flight at a time. The issuing caller holds the exchange
//! lock from the moment the command context is set up until the reader has
//! posted the completion code, so concurrent callers are served strictly in
//! the order they acquire the lock.

use std::io::Write;
use std::time::{Duration, Instant};

use anynet_at_protocol::{Command, Frame};
use anynet_metrics::metric_defs;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{ModemError, ModemResult};
use crate::stream::StreamWriter;

/// Synchronous completion code of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    /// `OK` or `SEND OK`.
    Success,
    /// `ERROR` or `SEND FAIL`.
    Failure,
}

/// Outcome of one command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Completion code posted by the reader.
    pub code: CompletionCode,
    /// Response lines collected while the command was in flight.
    pub body: Vec<String>,
}

impl CommandReply {
    pub fn is_success(&self) -> bool {
        self.code == CompletionCode::Success
    }

    /// Return the body of a successful reply, or `CommandFailed`.
    ///
    /// The body of a failed reply is discarded.
    pub fn into_body(self, command: &str) -> ModemResult<Vec<String>> {
        match self.code {
            CompletionCode::Success => Ok(self.body),
            CompletionCode::Failure => Err(ModemError::CommandFailed {
                command: command.to_string(),
            }),
        }
    }
}

/// The outstanding command, shared between the caller and the reader.
#[derive(Debug, Default)]
struct CommandContext {
    /// Name of the command in flight, `None` when idle.
    current: Option<String>,
    body: Vec<String>,
    code: Option<CompletionCode>,
    /// Payload to write when the modem sends its prompt.
    prompt: Option<Bytes>,
    disconnected: bool,
}

impl CommandContext {
    /// Name of the command still waiting for its completion code.
    ///
    /// Once the code is posted, later frames belong to someone else even
    /// though the caller has not woken up yet.
    fn awaiting(&self) -> Option<&str> {
        match self.code {
            None => self.current.as_deref(),
            Some(_) => None,
        }
    }

    fn finish(&mut self) -> (Option<CompletionCode>, Vec<String>) {
        self.current = None;
        self.prompt = None;
        (self.code.take(), std::mem::take(&mut self.body))
    }
}

/// Correlates commands with their completion codes and response lines.
pub struct CommandCorrelator {
    exchange: Mutex<()>,
    context: Mutex<CommandContext>,
    completed: Condvar,
    writer: Mutex<StreamWriter>,
    timeout: Option<Duration>,
}

impl CommandCorrelator {
    /// Create a correlator writing commands to `writer`.
    pub fn new(writer: StreamWriter, timeout: Option<Duration>) -> Self {
        CommandCorrelator {
            exchange: Mutex::new(()),
            context: Mutex::new(CommandContext::default()),
            completed: Condvar::new(),
            writer: Mutex::new(writer),
            timeout,
        }
    }

    /// Run a command and wait for its completion code.
    pub fn execute(&self, command: &Command) -> ModemResult<CommandReply> {
        self.execute_with_prompt(command, None)
    }

    /// Run a command whose payload is written when the modem prompts for it.
    pub fn execute_with_prompt(
        &self,
        command: &Command,
        prompt: Option<Bytes>,
    ) -> ModemResult<CommandReply> {
        let _exchange = self.exchange.lock();
        let name = command.name().to_string();

        {
            let mut ctx = self.context.lock();
            if ctx.disconnected {
                return Err(ModemError::Disconnected);
            }
            ctx.current = Some(name.clone());
            ctx.body.clear();
            ctx.code = None;
            ctx.prompt = prompt;
        }

        let line = command.encode();
        trace!("Sending command '{}'", command.to_command_string());
        metrics::counter!(metric_defs::COMMANDS_ISSUED.name, "command" => name.clone()).increment(1);
        let started = Instant::now();

        if let Err(e) = self.write(&line) {
            self.context.lock().finish();
            return Err(e.into());
        }

        let mut ctx = self.context.lock();
        let deadline = self.timeout.map(|timeout| started + timeout);
        while ctx.code.is_none() && !ctx.disconnected {
            match deadline {
                Some(deadline) => {
                    if self.completed.wait_until(&mut ctx, deadline).timed_out() {
                        break;
                    }
                }
                None => self.completed.wait(&mut ctx),
            }
        }
        let disconnected = ctx.disconnected;
        let (code, body) = ctx.finish();
        drop(ctx);

        let code = match code {
            Some(code) => code,
            None if disconnected => return Err(ModemError::Disconnected),
            None => {
                debug!("Command {} timed out", name);
                metrics::counter!(metric_defs::COMMANDS_TIMED_OUT.name, "command" => name.clone())
                    .increment(1);
                return Err(ModemError::Timeout { command: name });
            }
        };

        metrics::histogram!(metric_defs::COMMAND_LATENCY.name, "command" => name.clone())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if code == CompletionCode::Failure {
            metrics::counter!(metric_defs::COMMANDS_FAILED.name, "command" => name.clone())
                .increment(1);
        }
        debug!("Command {} completed: {:?} ({} body lines)", name, code, body.len());

        Ok(CommandReply { code, body })
    }

    fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(data)?;
        writer.flush()
    }

    // ========================================================================
    // Reader side
    // ========================================================================

    /// Whether a command is waiting for its completion code.
    pub fn is_outstanding(&self) -> bool {
        self.context.lock().awaiting().is_some()
    }

    /// Post a completion code.
    ///
    /// Returns `false` if no command is waiting for one; a second code for
    /// the same exchange is dropped.
    pub fn complete(&self, code: CompletionCode) -> bool {
        let mut ctx = self.context.lock();
        if ctx.awaiting().is_none() {
            return false;
        }
        ctx.code = Some(code);
        self.completed.notify_all();
        true
    }

    /// Append a `+NAME:` line if it belongs to the command in flight.
    pub fn append_prefixed(&self, text: &str) -> bool {
        let mut ctx = self.context.lock();
        let Some(current) = ctx.awaiting() else {
            return false;
        };
        match Frame::strip_name(text, current) {
            Some(rest) => {
                let rest = rest.to_string();
                ctx.body.push(rest);
                true
            }
            None => false,
        }
    }

    /// Append an unprefixed line to the command in flight.
    pub fn append_line(&self, line: &str) -> bool {
        let mut ctx = self.context.lock();
        if ctx.awaiting().is_none() {
            return false;
        }
        ctx.body.push(line.to_string());
        true
    }

    /// Take the pending prompt payload of the command in flight.
    pub fn take_prompt(&self) -> Option<Bytes> {
        let mut ctx = self.context.lock();
        if ctx.awaiting().is_none() {
            return None;
        }
        ctx.prompt.take()
    }

    /// Write a prompted payload to the modem.
    pub fn write_payload(&self, payload: &[u8]) -> std::io::Result<()> {
        trace!("Writing {} byte payload after prompt", payload.len());
        metrics::counter!(metric_defs::PUBLISHED_BYTES.name).increment(payload.len() as u64);
        self.write(payload)
    }

    /// Fail the command in flight and every later one.
    pub fn disconnect(&self) {
        let mut ctx = self.context.lock();
        ctx.disconnected = true;
        self.completed.notify_all();
    }

    pub fn is_disconnected(&self) -> bool {
        self.context.lock().disconnected
    }
}

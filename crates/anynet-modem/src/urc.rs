//! Exchanges acknowledged by an unsolicited notification.
//!
//! Channel open and close commands answer `OK` right away and report the
//! outcome later as `+<NAME>:<index>,<code>`. The wait for that notification
//! starts only after the synchronous exchange has released the command lock,
//! so it is guarded by a lock of its own.

use std::time::{Duration, Instant};

use anynet_at_protocol::{parse_fields, Command, Frame};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::correlator::CommandCorrelator;
use crate::error::{ModemError, ModemResult};

#[derive(Debug, Default)]
struct UrcContext {
    /// Name of the command whose acknowledgement is awaited.
    awaited: Option<String>,
    fields: Option<Vec<String>>,
    disconnected: bool,
}

/// Correlates open/close commands with their delayed acknowledgements.
pub struct UrcCorrelator {
    exchange: Mutex<()>,
    context: Mutex<UrcContext>,
    received: Condvar,
    timeout: Option<Duration>,
}

/// Clears the awaited marker on every exit path.
struct AwaitGuard<'a> {
    context: &'a Mutex<UrcContext>,
}

impl Drop for AwaitGuard<'_> {
    fn drop(&mut self) {
        let mut ctx = self.context.lock();
        ctx.awaited = None;
        ctx.fields = None;
    }
}

impl UrcCorrelator {
    pub fn new(timeout: Option<Duration>) -> Self {
        UrcCorrelator {
            exchange: Mutex::new(()),
            context: Mutex::new(UrcContext::default()),
            received: Condvar::new(),
            timeout,
        }
    }

    /// Run `command` and wait for its asynchronous acknowledgement.
    ///
    /// Fails with `CommandFailed` without waiting if the synchronous phase
    /// fails.
    pub fn execute_async(
        &self,
        commands: &CommandCorrelator,
        command: &Command,
    ) -> ModemResult<Vec<String>> {
        let _exchange = self.exchange.lock();
        let name = command.name();

        let _guard = {
            let mut ctx = self.context.lock();
            if ctx.disconnected {
                return Err(ModemError::Disconnected);
            }
            ctx.awaited = Some(name.to_string());
            ctx.fields = None;
            AwaitGuard { context: &self.context }
        };

        let reply = commands.execute(command)?;
        if !reply.is_success() {
            debug!("{} rejected, not waiting for acknowledgement", name);
            return Err(ModemError::CommandFailed { command: name.to_string() });
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut ctx = self.context.lock();
        while ctx.fields.is_none() && !ctx.disconnected {
            match deadline {
                Some(deadline) => {
                    if self.received.wait_until(&mut ctx, deadline).timed_out() {
                        break;
                    }
                }
                None => self.received.wait(&mut ctx),
            }
        }

        match ctx.fields.take() {
            Some(fields) => {
                debug!("{} acknowledged: {:?}", name, fields);
                Ok(fields)
            }
            None if ctx.disconnected => Err(ModemError::Disconnected),
            None => Err(ModemError::Timeout { command: name.to_string() }),
        }
    }

    /// Offer a `+NAME:` notification to the awaited exchange.
    ///
    /// Returns `false` if nothing waits for this name.
    pub fn offer(&self, text: &str) -> bool {
        let mut ctx = self.context.lock();
        let Some(awaited) = ctx.awaited.as_deref() else {
            return false;
        };
        let Some(rest) = Frame::strip_name(text, awaited) else {
            return false;
        };
        let fields = parse_fields(rest);
        trace!("Acknowledgement for {}: {:?}", awaited, fields);
        ctx.fields = Some(fields);
        self.received.notify_all();
        true
    }

    /// Fail the awaited exchange and every later one.
    pub fn disconnect(&self) {
        let mut ctx = self.context.lock();
        ctx.disconnected = true;
        self.received.notify_all();
    }
}

//! Public modem handle and info commands.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use anynet_at_protocol::{single_line, Command, ModemState};
use tracing::{debug, info};

use crate::config::ModemConfig;
use crate::correlator::CommandReply;
use crate::error::{ModemError, ModemResult};
use crate::reader::spawn_reader;
use crate::stream::StreamDriver;
use crate::Engine;

/// Handle to a running modem engine.
///
/// Cloning is cheap; clones share the link and the reader thread, and may be
/// used from any number of threads.
#[derive(Clone)]
pub struct Modem {
    pub(crate) engine: Arc<Engine>,
    pub(crate) config: ModemConfig,
}

impl Modem {
    /// Open the link through `driver` and start the reader.
    pub fn init<D: StreamDriver + ?Sized>(driver: &D, baud: u32) -> ModemResult<Modem> {
        let config = ModemConfig { baud, ..ModemConfig::default() };
        Self::init_with_config(driver, config)
    }

    /// Open the link with a full configuration.
    pub fn init_with_config<D: StreamDriver + ?Sized>(
        driver: &D,
        config: ModemConfig,
    ) -> ModemResult<Modem> {
        let (reader, writer) = driver.open(config.baud)?;
        Self::from_stream(reader, writer, config)
    }

    /// Start the engine on an already open link.
    pub fn from_stream<R, W>(reader: R, writer: W, config: ModemConfig) -> ModemResult<Modem>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        if config.channel_slots == 0 {
            return Err(ModemError::Config("channel_slots must be at least 1".to_string()));
        }
        let engine = Arc::new(Engine::new(Box::new(writer), &config));
        spawn_reader(reader, engine.clone())?;
        info!(
            "Modem engine started (baud {}, {} channel slots)",
            config.baud, config.channel_slots
        );
        Ok(Modem { engine, config })
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Whether the reader is still running.
    pub fn is_connected(&self) -> bool {
        !self.engine.commands.is_disconnected()
    }

    /// Run an arbitrary command.
    ///
    /// A failure code is returned in the reply, not as an error.
    pub fn execute(&self, command: &Command) -> ModemResult<CommandReply> {
        self.engine.commands.execute(command)
    }

    /// Modem connection state.
    pub fn state(&self) -> ModemResult<ModemState> {
        let body = self.query_body(&Command::State)?;
        let state = ModemState::parse(single_line(&body)?)?;
        debug!("Modem state: {}", state);
        Ok(state)
    }

    /// Modem connection state as its numeric code (0..=8).
    pub fn state_code(&self) -> ModemResult<u8> {
        Ok(self.state()?.code())
    }

    /// ICCID of the SIM.
    pub fn qccid(&self) -> ModemResult<String> {
        let body = self.query_body(&Command::Qccid)?;
        Ok(single_line(&body)?.to_string())
    }

    /// Firmware version string.
    pub fn version(&self) -> ModemResult<String> {
        let body = self.query_body(&Command::Version)?;
        Ok(single_line(&body)?.to_string())
    }

    /// Reload parameters from the SIM, resetting the modem.
    pub fn reset(&self) -> ModemResult<()> {
        self.query_body(&Command::Reset)?;
        info!("Modem reset requested");
        Ok(())
    }

    pub(crate) fn query_body(&self, command: &Command) -> ModemResult<Vec<String>> {
        self.engine.commands.execute(command)?.into_body(command.name())
    }
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.engine.subscriptions)
            .finish()
    }
}

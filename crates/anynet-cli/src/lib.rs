//! Command line front end for the AnyNet AWS modem.
//!
//! The modem is reached through a TCP serial bridge (`--connect host:port`).
//! Each subcommand maps onto one engine operation; `subscribe` and
//! `info --watch` keep running until Ctrl-C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anynet_modem::{
    Modem, ModemConfig, ModemError, PublishMode, SubscribeMode, TcpDriver,
};
use clap::{ArgGroup, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by the `anynet` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// A modem operation or the engine configuration failed.
    #[error(transparent)]
    Modem(#[from] ModemError),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// AnyNet AWS modem command line.
#[derive(Parser, Debug)]
#[command(name = "anynet", version, about = "Drive an AnyNet AWS IoT modem")]
pub struct Cli {
    /// Serial bridge address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7000")]
    pub connect: String,

    /// Baud rate; overrides the config file
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// YAML engine configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Operation to run
    #[command(subcommand)]
    pub command: CliCommand,
}

/// One modem operation.
#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print modem state, firmware version and SIM ICCID.
    Info {
        /// Repeat every N seconds until Ctrl-C
        #[arg(long)]
        watch: Option<u64>,
    },

    /// Publish one payload.
    Publish {
        /// Topic to publish on (the modem appends the thing name)
        #[arg(long)]
        topic: String,

        /// Payload, sent as UTF-8 bytes
        #[arg(long)]
        payload: String,

        /// Channel index to open or publish on
        #[arg(long, default_value_t = 0)]
        index: u8,

        /// MQTT quality of service
        #[arg(long, default_value_t = 1)]
        qos: u8,

        /// 0 = channel already open, 1 = always open, 2 = reuse or open
        #[arg(long, default_value_t = PublishMode::Reuse as u8)]
        mode: u8,
    },

    /// Print deliveries on a topic until Ctrl-C.
    Subscribe {
        /// Topic to subscribe to
        #[arg(long)]
        topic: String,

        /// Channel index to open if the topic is not open yet
        #[arg(long, default_value_t = 0)]
        index: u8,

        /// 0 = always open, 1 = reuse or open
        #[arg(long, default_value_t = SubscribeMode::Reuse as u8)]
        mode: u8,
    },

    /// Close a publish or subscribe channel.
    #[command(group(ArgGroup::new("direction").required(true).args(["publish", "subscribe"])))]
    Close {
        /// Close a publish channel
        #[arg(long = "pub")]
        publish: bool,

        /// Close a subscribe channel
        #[arg(long = "sub")]
        subscribe: bool,

        /// Channel index
        #[arg(long)]
        index: u8,
    },

    /// Reload parameters from the SIM.
    Reset,
}

impl Cli {
    /// Engine configuration: the config file if given, with `--baud` on top.
    pub fn modem_config(&self) -> CliResult<ModemConfig> {
        let mut config = match &self.config {
            Some(path) => ModemConfig::load(path)?,
            None => ModemConfig::default(),
        };
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        Ok(config)
    }
}

/// Connect to the modem and run the selected subcommand.
pub fn run(cli: Cli) -> CliResult<()> {
    anynet_metrics::describe_metrics();

    let config = cli.modem_config()?;
    let driver = TcpDriver::new(cli.connect.clone());
    info!("Connecting to modem at {}", cli.connect);
    let modem = Modem::init_with_config(&driver, config)?;

    match cli.command {
        CliCommand::Info { watch } => run_info(&modem, watch),
        CliCommand::Publish { topic, payload, index, qos, mode } => {
            let mode = PublishMode::try_from(mode)?;
            modem.publish(&topic, payload.as_bytes(), index, qos, mode)?;
            println!("Published {} bytes to {}", payload.len(), topic);
            Ok(())
        }
        CliCommand::Subscribe { topic, index, mode } => run_subscribe(&modem, &topic, index, mode),
        CliCommand::Close { publish, index, .. } => {
            if publish {
                modem.pubclose(index)?;
            } else {
                modem.subclose(index)?;
            }
            println!("Closed {} channel {}", if publish { "publish" } else { "subscribe" }, index);
            Ok(())
        }
        CliCommand::Reset => {
            modem.reset()?;
            println!("Reset requested");
            Ok(())
        }
    }
}

fn run_info(modem: &Modem, watch: Option<u64>) -> CliResult<()> {
    print_info(modem)?;
    let Some(secs) = watch else {
        return Ok(());
    };

    let running = stop_flag()?;
    let interval = Duration::from_secs(secs.max(1));
    while wait_while_running(&running, interval) {
        print_info(modem)?;
    }
    Ok(())
}

fn print_info(modem: &Modem) -> CliResult<()> {
    let state = modem.state()?;
    println!("State:   {} ({})", state, state.code());
    println!("Version: {}", modem.version()?);
    println!("ICCID:   {}", modem.qccid()?);
    if !state.is_ready() {
        warn!("Modem is not connected to the broker yet");
    }
    Ok(())
}

fn run_subscribe(modem: &Modem, topic: &str, index: u8, mode: u8) -> CliResult<()> {
    let mode = SubscribeMode::try_from(mode)?;
    let index = modem.subscribe(
        topic,
        |index, topic, data| {
            println!("[{}] {}: {}", index, topic, String::from_utf8_lossy(data));
        },
        index,
        mode,
    )?;
    println!("Subscribed to {} on index {}; Ctrl-C to stop", topic, index);

    let running = stop_flag()?;
    while wait_while_running(&running, Duration::from_millis(200)) {
        if !modem.is_connected() {
            return Err(ModemError::Disconnected.into());
        }
    }

    if let Err(e) = modem.subclose(index) {
        warn!("Failed to close subscribe channel {}: {}", index, e);
    }
    Ok(())
}

/// Flag cleared by Ctrl-C.
fn stop_flag() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;
    Ok(running)
}

/// Sleep for `period` in short steps; false once the flag is cleared.
fn wait_while_running(running: &AtomicBool, period: Duration) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < period {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        thread::sleep(step);
        waited += step;
    }
    running.load(Ordering::SeqCst)
}

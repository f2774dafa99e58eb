//! AnyNet AWS Modem Engine
//!
//! Drives the AnyNet AWS IoT modem over its AT command link: one background
//! thread reads and routes every frame, while any number of caller threads
//! run commands, open and close channels, publish and subscribe.
//!
//! # Architecture
//!
//! - [`CommandCorrelator`]: the single in-flight command, its response lines
//!   and completion code
//! - [`UrcCorrelator`]: the delayed acknowledgement of channel open/close
//! - [`SubscriptionRegistry`]: callbacks for delivered payloads, per slot
//! - reader thread: classifies frames and feeds the three above
//! - [`Modem`]: the public operations, including channel reuse policy
//!
//! # Example
//!
//! ```rust,ignore
//! use anynet_modem::{Modem, PublishMode, TcpDriver};
//!
//! let modem = Modem::init(&TcpDriver::new("127.0.0.1:7000"), 9600)?;
//! println!("state: {}", modem.state()?);
//! modem.subscribe("mychannel/commands", |index, topic, data| {
//!     println!("{} bytes on {} (slot {})", data.len(), topic, index);
//! }, 0, Default::default())?;
//! modem.publish("mychannel/devices", b"hello!", 0, 1, PublishMode::Reuse)?;
//! ```

mod channel;
mod config;
mod correlator;
mod error;
mod modem;
mod reader;
mod stream;
mod subscriptions;
mod urc;

pub use anynet_at_protocol::{ChannelKind, ModemState};
pub use channel::*;
pub use config::*;
pub use correlator::*;
pub use error::*;
pub use modem::*;
pub use stream::*;
pub use subscriptions::*;
pub use urc::*;

/// Correlation state shared by the reader thread and callers.
pub(crate) struct Engine {
    pub(crate) commands: CommandCorrelator,
    pub(crate) urcs: UrcCorrelator,
    pub(crate) subscriptions: SubscriptionRegistry,
}

impl Engine {
    pub(crate) fn new(writer: StreamWriter, config: &ModemConfig) -> Self {
        Engine {
            commands: CommandCorrelator::new(writer, config.command_timeout()),
            urcs: UrcCorrelator::new(config.urc_timeout()),
            subscriptions: SubscriptionRegistry::new(config.channel_slots),
        }
    }

    /// Wake every waiter with `Disconnected`.
    pub(crate) fn disconnect(&self) {
        self.commands.disconnect();
        self.urcs.disconnect();
    }
}

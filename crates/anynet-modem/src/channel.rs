//! Publish and subscribe channels.
//!
//! A channel binds a topic to a modem socket index. An index hosts at most
//! one open channel per direction; opening a second one is reported as
//! [`ModemError::ChannelInUse`] so the caller can pick another index.

use std::sync::Arc;

use anynet_at_protocol::{ChannelKind, ChannelStatus, Command, OpenChannelEntry};
use bytes::Bytes;
use tracing::debug;

use crate::error::{ModemError, ModemResult};
use crate::modem::Modem;
use crate::subscriptions::SubscriptionCallback;

/// Channel policy for [`Modem::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// The channel at the given index is already open; just send.
    Manual = 0,
    /// Always open a channel at the given index, then send.
    ForceOpen = 1,
    /// Send on the index already open for the topic, or open one.
    #[default]
    Reuse = 2,
}

impl TryFrom<u8> for PublishMode {
    type Error = ModemError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PublishMode::Manual),
            1 => Ok(PublishMode::ForceOpen),
            2 => Ok(PublishMode::Reuse),
            other => Err(ModemError::InvalidMode(other)),
        }
    }
}

/// Channel policy for [`Modem::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscribeMode {
    /// Always open a channel at the given index.
    Fresh = 0,
    /// Use the index already open for the topic, or open one.
    #[default]
    Reuse = 1,
}

impl TryFrom<u8> for SubscribeMode {
    type Error = ModemError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SubscribeMode::Fresh),
            1 => Ok(SubscribeMode::Reuse),
            other => Err(ModemError::InvalidMode(other)),
        }
    }
}

/// Find the index hosting `topic` in an open-channel listing.
pub fn find_open_index(listing: &[String], topic: &str) -> ModemResult<Option<u8>> {
    for line in listing {
        let entry = OpenChannelEntry::parse(line)?;
        if entry.topic == topic {
            return Ok(Some(entry.index));
        }
    }
    Ok(None)
}

impl Modem {
    // ========================================================================
    // Publish
    // ========================================================================

    /// Open a publish channel for `topic` on socket `index`.
    ///
    /// The firmware appends the thing name to the topic.
    pub fn pubopen(&self, topic: &str, index: u8) -> ModemResult<()> {
        self.open_channel(ChannelKind::Publish, topic, index)
    }

    /// Index of the publish channel open for `topic`, if any.
    pub fn pubopen_index(&self, topic: &str) -> ModemResult<Option<u8>> {
        self.open_index(ChannelKind::Publish, topic)
    }

    /// Publish `payload` on `topic`.
    ///
    /// `mode` selects how the channel is found; see [`PublishMode`]. With
    /// [`PublishMode::Reuse`] an already open channel's index replaces
    /// `index`.
    pub fn publish(
        &self,
        topic: &str,
        payload: impl AsRef<[u8]>,
        index: u8,
        qos: u8,
        mode: PublishMode,
    ) -> ModemResult<()> {
        self.check_index(index)?;
        let index = match mode {
            PublishMode::Manual => index,
            PublishMode::ForceOpen => {
                self.pubopen(topic, index)?;
                index
            }
            PublishMode::Reuse => self.reuse_or_open(ChannelKind::Publish, topic, index)?,
        };

        let payload = Bytes::copy_from_slice(payload.as_ref());
        let command = Command::Publish { index, len: payload.len(), qos };
        debug!("Publishing {} bytes on {} (index {}, qos {})", payload.len(), topic, index, qos);
        self.engine
            .commands
            .execute_with_prompt(&command, Some(payload))?
            .into_body(command.name())?;
        Ok(())
    }

    /// Close the publish channel on socket `index`.
    pub fn pubclose(&self, index: u8) -> ModemResult<()> {
        self.close_channel(ChannelKind::Publish, index)
    }

    // ========================================================================
    // Subscribe
    // ========================================================================

    /// Open a subscribe channel for `topic` on socket `index`.
    ///
    /// Payloads are only dispatched once a callback is registered with
    /// [`Modem::subscribe`].
    pub fn subopen(&self, topic: &str, index: u8) -> ModemResult<()> {
        self.open_channel(ChannelKind::Subscribe, topic, index)
    }

    /// Index of the subscribe channel open for `topic`, if any.
    pub fn subopen_index(&self, topic: &str) -> ModemResult<Option<u8>> {
        self.open_index(ChannelKind::Subscribe, topic)
    }

    /// Subscribe to `topic`, calling `callback` for every delivered payload.
    ///
    /// The callback receives `(index, topic, payload)` on the reader thread
    /// and replaces any callback previously registered on the same index.
    pub fn subscribe<F>(
        &self,
        topic: &str,
        callback: F,
        index: u8,
        mode: SubscribeMode,
    ) -> ModemResult<u8>
    where
        F: Fn(u8, &str, &[u8]) + Send + Sync + 'static,
    {
        self.check_index(index)?;
        let index = match mode {
            SubscribeMode::Fresh => {
                self.subopen(topic, index)?;
                index
            }
            SubscribeMode::Reuse => self.reuse_or_open(ChannelKind::Subscribe, topic, index)?,
        };

        let callback: SubscriptionCallback = Arc::new(callback);
        self.engine.subscriptions.set(index, topic, callback)?;
        debug!("Subscribed to {} on index {}", topic, index);
        Ok(index)
    }

    /// Close the subscribe channel on socket `index`.
    ///
    /// The callback registered on the index is dropped once the modem
    /// confirms the close.
    pub fn subclose(&self, index: u8) -> ModemResult<()> {
        self.close_channel(ChannelKind::Subscribe, index)?;
        if let Some(topic) = self.engine.subscriptions.clear(index) {
            debug!("Unsubscribed from {} on index {}", topic, index);
        }
        Ok(())
    }

    /// Topic registered for deliveries on `index`.
    pub fn subscription_topic(&self, index: u8) -> Option<String> {
        self.engine.subscriptions.topic(index)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_index(&self, index: u8) -> ModemResult<()> {
        if index >= self.config.channel_slots {
            return Err(ModemError::InvalidChannel {
                index,
                slots: self.config.channel_slots,
            });
        }
        Ok(())
    }

    fn reuse_or_open(&self, kind: ChannelKind, topic: &str, index: u8) -> ModemResult<u8> {
        match self.open_index(kind, topic)? {
            Some(existing) => {
                debug!("Reusing {} channel for {} on index {}", kind.as_str(), topic, existing);
                Ok(existing)
            }
            None => {
                self.open_channel(kind, topic, index)?;
                Ok(index)
            }
        }
    }

    fn open_channel(&self, kind: ChannelKind, topic: &str, index: u8) -> ModemResult<()> {
        self.check_index(index)?;
        let command = Command::Open { kind, index, topic: topic.to_string() };
        let fields = self.engine.urcs.execute_async(&self.engine.commands, &command)?;
        acknowledge(kind, index, &fields)?;
        debug!("Opened {} channel for {} on index {}", kind.as_str(), topic, index);
        Ok(())
    }

    fn close_channel(&self, kind: ChannelKind, index: u8) -> ModemResult<()> {
        self.check_index(index)?;
        let command = Command::Close { kind, index };
        let fields = self.engine.urcs.execute_async(&self.engine.commands, &command)?;
        acknowledge(kind, index, &fields)?;
        debug!("Closed {} channel on index {}", kind.as_str(), index);
        Ok(())
    }

    fn open_index(&self, kind: ChannelKind, topic: &str) -> ModemResult<Option<u8>> {
        let listing = self.query_body(&Command::ListOpen { kind })?;
        find_open_index(&listing, topic)
    }
}

fn acknowledge(kind: ChannelKind, index: u8, fields: &[String]) -> ModemResult<()> {
    match ChannelStatus::from_fields(fields)? {
        ChannelStatus::Done => Ok(()),
        ChannelStatus::InUse => Err(ModemError::ChannelInUse { kind: kind.as_str(), index }),
        ChannelStatus::Failed => Err(ModemError::ChannelError { kind: kind.as_str(), index }),
        ChannelStatus::Other(code) => {
            debug!("{} channel index {} acknowledged with code {}", kind.as_str(), index, code);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selectors() {
        assert_eq!(PublishMode::default(), PublishMode::Reuse);
        assert_eq!(SubscribeMode::default(), SubscribeMode::Reuse);
        assert_eq!(PublishMode::try_from(1).unwrap(), PublishMode::ForceOpen);
        assert_eq!(SubscribeMode::try_from(0).unwrap(), SubscribeMode::Fresh);
        assert!(matches!(PublishMode::try_from(3), Err(ModemError::InvalidMode(3))));
        assert!(matches!(SubscribeMode::try_from(2), Err(ModemError::InvalidMode(2))));
    }

    #[test]
    fn test_find_open_index() {
        let listing = vec![
            "0:\"mychannel/commands/thing\"".to_string(),
            "1:\"mychannel/devices/thing\"".to_string(),
        ];
        assert_eq!(find_open_index(&listing, "mychannel/devices").unwrap(), Some(1));
        assert_eq!(find_open_index(&listing, "mychannel").unwrap(), None);
        assert_eq!(find_open_index(&[], "t").unwrap(), None);
        assert!(find_open_index(&["garbage".to_string()], "t").is_err());
    }

    #[test]
    fn test_acknowledge_codes() {
        let ack = |code: &str| vec!["0".to_string(), code.to_string()];
        assert!(acknowledge(ChannelKind::Publish, 0, &ack("0")).is_ok());
        assert!(matches!(
            acknowledge(ChannelKind::Publish, 0, &ack("-2")),
            Err(ModemError::ChannelInUse { kind: "publish", index: 0 })
        ));
        assert!(matches!(
            acknowledge(ChannelKind::Subscribe, 1, &ack("-1")),
            Err(ModemError::ChannelError { kind: "subscribe", index: 1 })
        ));
        assert!(matches!(
            acknowledge(ChannelKind::Subscribe, 1, &["0".to_string()]),
            Err(ModemError::Protocol(_))
        ));
    }
}

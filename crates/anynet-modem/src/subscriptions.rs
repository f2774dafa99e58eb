//! Subscription slots and payload dispatch.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ModemError, ModemResult};

/// Callback invoked with `(channel index, topic, payload)` for each delivery.
///
/// Callbacks run on the reader thread. A slow callback stalls every other
/// frame, and a callback must not issue modem commands itself.
pub type SubscriptionCallback = Arc<dyn Fn(u8, &str, &[u8]) + Send + Sync>;

struct Subscription {
    topic: String,
    callback: SubscriptionCallback,
}

/// Maps channel slots to `(topic, callback)` pairs.
pub struct SubscriptionRegistry {
    slots: RwLock<Vec<Option<Subscription>>>,
}

impl SubscriptionRegistry {
    /// Create a registry with a fixed number of slots.
    pub fn new(slots: u8) -> Self {
        SubscriptionRegistry {
            slots: RwLock::new((0..slots).map(|_| None).collect()),
        }
    }

    /// Register a subscription, replacing whatever the slot held.
    pub fn set(&self, index: u8, topic: &str, callback: SubscriptionCallback) -> ModemResult<()> {
        let mut slots = self.slots.write();
        let len = slots.len();
        let slot = slots.get_mut(index as usize).ok_or(ModemError::InvalidChannel {
            index,
            slots: len as u8,
        })?;
        *slot = Some(Subscription { topic: topic.to_string(), callback });
        Ok(())
    }

    /// Empty a slot, returning the topic it held.
    pub fn clear(&self, index: u8) -> Option<String> {
        self.slots
            .write()
            .get_mut(index as usize)
            .and_then(Option::take)
            .map(|sub| sub.topic)
    }

    /// Topic registered on a slot.
    pub fn topic(&self, index: u8) -> Option<String> {
        self.slots
            .read()
            .get(index as usize)
            .and_then(Option::as_ref)
            .map(|sub| sub.topic.clone())
    }

    /// Hand a payload to the slot's callback.
    ///
    /// Returns `false` if the slot is empty or out of range.
    pub fn dispatch(&self, index: u8, payload: &[u8]) -> bool {
        // Call outside the lock so the callback may inspect the registry.
        let target = self
            .slots
            .read()
            .get(index as usize)
            .and_then(Option::as_ref)
            .map(|sub| (sub.topic.clone(), sub.callback.clone()));

        match target {
            Some((topic, callback)) => {
                callback(index, &topic, payload);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics: Vec<Option<String>> = self
            .slots
            .read()
            .iter()
            .map(|slot| slot.as_ref().map(|sub| sub.topic.clone()))
            .collect();
        f.debug_struct("SubscriptionRegistry").field("topics", &topics).finish()
    }
}

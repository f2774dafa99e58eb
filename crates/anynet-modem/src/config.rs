//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModemError, ModemResult};

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 9600;

/// Number of socket indices on the reference modem.
pub const DEFAULT_CHANNEL_SLOTS: u8 = 2;

/// Configuration for a [`Modem`](crate::Modem).
///
/// Timeouts are off by default: a caller waits until the modem answers or
/// the link drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModemConfig {
    /// Serial baud rate handed to the stream driver.
    pub baud: u32,
    /// Number of socket indices (subscription slots).
    pub channel_slots: u8,
    /// Bound on the wait for a command completion code.
    pub command_timeout_ms: Option<u64>,
    /// Bound on the wait for an open/close acknowledgement.
    pub urc_timeout_ms: Option<u64>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            baud: DEFAULT_BAUD,
            channel_slots: DEFAULT_CHANNEL_SLOTS,
            command_timeout_ms: None,
            urc_timeout_ms: None,
        }
    }
}

impl ModemConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml_str(yaml: &str) -> ModemResult<Self> {
        let config: ModemConfig =
            serde_yaml::from_str(yaml).map_err(|e| ModemError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ModemResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ModemError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> ModemResult<()> {
        if self.channel_slots == 0 {
            return Err(ModemError::Config("channel_slots must be at least 1".to_string()));
        }
        if self.baud == 0 {
            return Err(ModemError::Config("baud must be positive".to_string()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub fn urc_timeout(&self) -> Option<Duration> {
        self.urc_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModemConfig::default();
        assert_eq!(config.baud, 9600);
        assert_eq!(config.channel_slots, 2);
        assert_eq!(config.command_timeout(), None);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = ModemConfig::from_yaml_str("baud: 115200\ncommand_timeout_ms: 2500\n").unwrap();
        assert_eq!(config.baud, 115200);
        assert_eq!(config.channel_slots, 2);
        assert_eq!(config.command_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.urc_timeout(), None);
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(
            ModemConfig::from_yaml_str("bogus: 1\n"),
            Err(ModemError::Config(_))
        ));
        assert!(matches!(
            ModemConfig::from_yaml_str("channel_slots: 0\n"),
            Err(ModemError::Config(_))
        ));
    }
}

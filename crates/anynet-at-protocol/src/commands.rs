//! Commands understood by the AnyNet AWS modem firmware.

use crate::codec::encode_command;

/// Direction of a modem channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Publish channel (`AWSPUB*` commands).
    Publish,
    /// Subscribe channel (`AWSSUB*` commands).
    Subscribe,
}

impl ChannelKind {
    /// Name of the open command for this direction.
    pub fn open_command(&self) -> &'static str {
        match self {
            ChannelKind::Publish => "AWSPUBOPEN",
            ChannelKind::Subscribe => "AWSSUBOPEN",
        }
    }

    /// Name of the close command for this direction.
    pub fn close_command(&self) -> &'static str {
        match self {
            ChannelKind::Publish => "AWSPUBCLOSE",
            ChannelKind::Subscribe => "AWSSUBCLOSE",
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Publish => "publish",
            ChannelKind::Subscribe => "subscribe",
        }
    }
}

/// A command that can be sent to the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ========== Info Commands ==========
    /// Query the modem state (`AT+AWSSTATE?`).
    State,

    /// Read the SIM ICCID (`AT+QCCID`).
    Qccid,

    /// Read the firmware version (`AT+AWSVER`).
    Version,

    /// Reload parameters from the SIM and reset (`AT+AWSRESET`).
    Reset,

    // ========== Channel Commands ==========
    /// Open a channel on a socket index.
    Open {
        /// Channel direction.
        kind: ChannelKind,
        /// Socket index.
        index: u8,
        /// Topic, unquoted.
        topic: String,
    },

    /// List the open channels of one direction.
    ListOpen {
        /// Channel direction.
        kind: ChannelKind,
    },

    /// Close the channel on a socket index.
    Close {
        /// Channel direction.
        kind: ChannelKind,
        /// Socket index.
        index: u8,
    },

    /// Publish on an open channel. The payload follows the prompt.
    Publish {
        /// Socket index of the publish channel.
        index: u8,
        /// Payload length in bytes.
        len: usize,
        /// MQTT quality of service.
        qos: u8,
    },

    // ========== Raw Command ==========
    /// Any other command.
    Raw {
        /// Command name without `AT+`.
        name: String,
        /// Query form (`?`).
        query: bool,
        /// Arguments, already quoted where needed.
        args: Option<Vec<String>>,
    },
}

impl Command {
    /// Convenience constructor for a publish channel open.
    pub fn pub_open(index: u8, topic: impl Into<String>) -> Command {
        Command::Open { kind: ChannelKind::Publish, index, topic: topic.into() }
    }

    /// Convenience constructor for a subscribe channel open.
    pub fn sub_open(index: u8, topic: impl Into<String>) -> Command {
        Command::Open { kind: ChannelKind::Subscribe, index, topic: topic.into() }
    }

    /// Command name as echoed in `+NAME:` responses.
    pub fn name(&self) -> &str {
        match self {
            Command::State => "AWSSTATE",
            Command::Qccid => "QCCID",
            Command::Version => "AWSVER",
            Command::Reset => "AWSRESET",
            Command::Open { kind, .. } | Command::ListOpen { kind } => kind.open_command(),
            Command::Close { kind, .. } => kind.close_command(),
            Command::Publish { .. } => "AWSPUBLISH",
            Command::Raw { name, .. } => name,
        }
    }

    /// Whether the command is sent in query form.
    pub fn is_query(&self) -> bool {
        match self {
            Command::State | Command::ListOpen { .. } => true,
            Command::Raw { query, .. } => *query,
            _ => false,
        }
    }

    /// Command arguments, if any.
    pub fn args(&self) -> Option<Vec<String>> {
        match self {
            Command::Open { index, topic, .. } => {
                Some(vec![index.to_string(), format!("\"{}\"", topic)])
            }
            Command::Close { index, .. } => Some(vec![index.to_string()]),
            Command::Publish { index, len, qos } => {
                Some(vec![index.to_string(), len.to_string(), qos.to_string()])
            }
            Command::Raw { args, .. } => args.clone(),
            _ => None,
        }
    }

    /// Encode the full command line, including `AT+` and `\r\n`.
    pub fn encode(&self) -> Vec<u8> {
        let args = self.args();
        encode_command(self.name(), self.is_query(), args.as_deref())
    }

    /// Get the command line without the terminator.
    pub fn to_command_string(&self) -> String {
        let encoded = self.encode();
        String::from_utf8_lossy(&encoded[..encoded.len() - 2]).into_owned()
    }
}

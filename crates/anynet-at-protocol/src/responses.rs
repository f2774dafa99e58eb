//! Response parsing for the AT protocol.
//!
//! Command output arrives as body lines collected by the engine; the types
//! here turn those lines and the fields of asynchronous notifications into
//! typed values.

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Name of the delivery notification (`+AWS:<slot>,<length>`).
pub const DELIVERY_NAME: &str = "AWS";

/// Modem connection state reported by `AT+AWSSTATE?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemState {
    /// 0: nothing started.
    Idle,
    /// 1: waiting for certificates and keys on the SIM.
    WaitingKeys,
    /// 2: attaching to the cellular network.
    ConnectingNetwork,
    /// 3: TLS handshake with the broker in progress.
    EstablishingSsl,
    /// 4: TLS session up.
    SslConnected,
    /// 5: MQTT connect in progress.
    ConnectingMqtt,
    /// 6: connected to the broker.
    MqttConnected,
    /// 7: connected, with at least one subscription.
    Subscribed,
    /// 8: the modem gave up.
    Error,
}

impl ModemState {
    /// Map a state code (0..=8) to a state.
    pub fn from_code(code: i64) -> ProtocolResult<ModemState> {
        Ok(match code {
            0 => ModemState::Idle,
            1 => ModemState::WaitingKeys,
            2 => ModemState::ConnectingNetwork,
            3 => ModemState::EstablishingSsl,
            4 => ModemState::SslConnected,
            5 => ModemState::ConnectingMqtt,
            6 => ModemState::MqttConnected,
            7 => ModemState::Subscribed,
            8 => ModemState::Error,
            other => return Err(ProtocolError::UnknownState(other)),
        })
    }

    /// Parse the single body line of a state query.
    pub fn parse(value: &str) -> ProtocolResult<ModemState> {
        ModemState::from_code(parse_number(value)?)
    }

    /// Numeric state code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Human readable state, as the modem documentation names it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModemState::Idle => "Idle",
            ModemState::WaitingKeys => "Waiting Keys",
            ModemState::ConnectingNetwork => "Connecting to Network",
            ModemState::EstablishingSsl => "Establishing SSL",
            ModemState::SslConnected => "SSL Connected",
            ModemState::ConnectingMqtt => "Connecting MQTT",
            ModemState::MqttConnected => "Ready: MQTT Connected",
            ModemState::Subscribed => "Ready: Subscribed",
            ModemState::Error => "Error",
        }
    }

    /// Whether the modem is connected to the broker.
    pub fn is_ready(&self) -> bool {
        matches!(self, ModemState::MqttConnected | ModemState::Subscribed)
    }
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome code of a channel open or close acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// `0`: the operation succeeded.
    Done,
    /// `-1`: generic failure.
    Failed,
    /// `-2`: the socket index already hosts a channel of this direction.
    InUse,
    /// Any other code.
    Other(i64),
}

impl ChannelStatus {
    /// Map a response code to a status.
    pub fn from_code(code: i64) -> ChannelStatus {
        match code {
            0 => ChannelStatus::Done,
            -1 => ChannelStatus::Failed,
            -2 => ChannelStatus::InUse,
            other => ChannelStatus::Other(other),
        }
    }

    /// Parse the status out of acknowledgement fields (`<index>,<code>`).
    pub fn from_fields(fields: &[String]) -> ProtocolResult<ChannelStatus> {
        let code = fields.get(1).ok_or(ProtocolError::FieldCount {
            expected: 2,
            actual: fields.len(),
        })?;
        Ok(ChannelStatus::from_code(parse_number(code)?))
    }
}

/// Header of a `+AWS:<slot>,<length>` delivery notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Subscription slot the payload belongs to.
    pub slot: u8,
    /// Length of the raw payload following the header.
    pub len: usize,
}

impl Delivery {
    /// Parse the header from the text of a prefixed frame (`AWS:1,5`).
    ///
    /// Returns `Ok(None)` if the frame is not a delivery notification.
    pub fn parse_header(text: &str) -> ProtocolResult<Option<Delivery>> {
        let Some(rest) = text
            .strip_prefix(DELIVERY_NAME)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            return Ok(None);
        };

        let bad = || ProtocolError::BadDeliveryHeader(text.to_string());
        let (slot, len) = rest.trim().split_once(',').ok_or_else(bad)?;
        let slot: u8 = slot.trim().parse().map_err(|_| bad())?;
        let len: usize = len.trim().parse().map_err(|_| bad())?;
        Ok(Some(Delivery { slot, len }))
    }

    /// Payload length of a delivery header that failed to parse.
    ///
    /// The payload still follows such a header on the wire, so the reader
    /// skips it when the length is readable.
    pub fn announced_len(text: &str) -> Option<usize> {
        let rest = text.strip_prefix(DELIVERY_NAME)?.strip_prefix(':')?;
        rest.rsplit_once(',')?.1.trim().parse().ok()
    }
}

/// Split notification fields on commas, trimming blanks.
pub fn parse_fields(text: &str) -> Vec<String> {
    text.trim_matches(' ')
        .split(',')
        .map(|field| field.trim().to_string())
        .collect()
}

/// Require a command body with exactly one line and return it.
pub fn single_line(body: &[String]) -> ProtocolResult<&str> {
    match body {
        [line] => Ok(line.as_str()),
        _ => Err(ProtocolError::FieldCount { expected: 1, actual: body.len() }),
    }
}

/// One entry of an open-channel listing.
///
/// The modem reports `<index>:"<topic>/<thing name>"`; the thing name is
/// appended by the firmware and is not part of the topic the caller opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelEntry {
    /// Socket index hosting the channel.
    pub index: u8,
    /// Topic without the thing name.
    pub topic: String,
}

impl OpenChannelEntry {
    /// Parse a listing line.
    pub fn parse(line: &str) -> ProtocolResult<OpenChannelEntry> {
        let bad = || ProtocolError::BadChannelEntry(line.to_string());
        let (index, topic) = line.split_once(':').ok_or_else(bad)?;
        let index: u8 = index.trim().parse().map_err(|_| bad())?;
        let (topic, _thing_name) = topic.rsplit_once('/').ok_or_else(bad)?;
        let topic = topic.trim_start().strip_prefix('"').unwrap_or(topic);
        Ok(OpenChannelEntry { index, topic: topic.to_string() })
    }
}

fn parse_number(value: &str) -> ProtocolResult<i64> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| {
        ProtocolError::MalformedField {
            field: value.to_string(),
            reason: e.to_string(),
        }
    })
}

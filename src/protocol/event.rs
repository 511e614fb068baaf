//! Protocol event kinds and payloads.

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};
use thiserror::Error;

/// The kind of a protocol event, as named on the webhook wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A pairing code to be rendered as a QR code.
    Qr,
    /// An incoming or outgoing chat message.
    Message,
    /// A delivery or read receipt.
    ReadReceipt,
    /// Online/offline presence of a contact.
    Presence,
    /// Typing/recording state inside a chat.
    ChatPresence,
    /// The client connected and authenticated.
    Connected,
    /// The transport dropped.
    Disconnected,
    /// The remote side invalidated the pairing.
    LoggedOut,
    /// A chunk of message history.
    HistorySync,
    /// An incoming call.
    CallOffer,
    /// Group metadata changed.
    GroupInfo,
    /// The account was added to a group.
    JoinedGroup,
}

impl EventKind {
    /// Every event kind, in wire-name order used for documentation.
    pub const ALL: [Self; 12] = [
        Self::Qr,
        Self::Message,
        Self::ReadReceipt,
        Self::Presence,
        Self::ChatPresence,
        Self::Connected,
        Self::Disconnected,
        Self::LoggedOut,
        Self::HistorySync,
        Self::CallOffer,
        Self::GroupInfo,
        Self::JoinedGroup,
    ];

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qr => "QR",
            Self::Message => "Message",
            Self::ReadReceipt => "ReadReceipt",
            Self::Presence => "Presence",
            Self::ChatPresence => "ChatPresence",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::LoggedOut => "LoggedOut",
            Self::HistorySync => "HistorySync",
            Self::CallOffer => "CallOffer",
            Self::GroupInfo => "GroupInfo",
            Self::JoinedGroup => "JoinedGroup",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized event kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// An event emitted by a live protocol client.
///
/// Connection-state and pairing events carry typed fields because the relay
/// projects them onto the session record. Everything else is opaque data
/// forwarded verbatim to webhooks.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A new pairing code is available.
    Qr {
        /// The raw pairing code.
        code: String,
    },
    /// The client connected; `identity` is the resolved protocol identity.
    Connected {
        /// Protocol identity of the paired device.
        identity: String,
    },
    /// The transport dropped.
    Disconnected,
    /// The remote side invalidated the pairing.
    LoggedOut {
        /// Reason reported by the network.
        reason: String,
    },
    /// A chat message.
    Message(Value),
    /// A delivery or read receipt.
    ReadReceipt(Value),
    /// Contact presence.
    Presence(Value),
    /// Chat presence (typing, recording).
    ChatPresence(Value),
    /// History sync chunk.
    HistorySync(Value),
    /// Incoming call.
    CallOffer(Value),
    /// Group metadata change.
    GroupInfo(Value),
    /// Joined a group.
    JoinedGroup(Value),
}

impl ProtocolEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Qr { .. } => EventKind::Qr,
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::LoggedOut { .. } => EventKind::LoggedOut,
            Self::Message(_) => EventKind::Message,
            Self::ReadReceipt(_) => EventKind::ReadReceipt,
            Self::Presence(_) => EventKind::Presence,
            Self::ChatPresence(_) => EventKind::ChatPresence,
            Self::HistorySync(_) => EventKind::HistorySync,
            Self::CallOffer(_) => EventKind::CallOffer,
            Self::GroupInfo(_) => EventKind::GroupInfo,
            Self::JoinedGroup(_) => EventKind::JoinedGroup,
        }
    }

    /// Builds the webhook `data` object for this event.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Qr { code } => json!({ "code": code }),
            Self::Connected { identity } => json!({ "jid": identity }),
            Self::Disconnected => Value::Null,
            Self::LoggedOut { reason } => json!({ "reason": reason }),
            Self::Message(data)
            | Self::ReadReceipt(data)
            | Self::Presence(data)
            | Self::ChatPresence(data)
            | Self::HistorySync(data)
            | Self::CallOffer(data)
            | Self::GroupInfo(data)
            | Self::JoinedGroup(data) => data.clone(),
        }
    }
}

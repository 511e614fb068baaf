//! Session fields derived from protocol events.

use crate::protocol::ProtocolEvent;

/// A session update implied by a protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection<'a> {
    /// Set `connected = true` and record the identity (if non-empty).
    Online {
        /// Protocol identity reported on connect.
        identity: &'a str,
    },
    /// Set `connected = false`.
    Offline,
    /// Store the latest pairing code.
    PairingCode(&'a str),
}

impl<'a> Projection<'a> {
    /// Returns the projection for `event`, or `None` for pure data events.
    #[must_use]
    pub fn of(event: &'a ProtocolEvent) -> Option<Self> {
        match event {
            ProtocolEvent::Connected { identity } => Some(Self::Online {
                identity: identity.as_str(),
            }),
            ProtocolEvent::Disconnected | ProtocolEvent::LoggedOut { .. } => Some(Self::Offline),
            ProtocolEvent::Qr { code } => Some(Self::PairingCode(code.as_str())),
            ProtocolEvent::Message(_)
            | ProtocolEvent::ReadReceipt(_)
            | ProtocolEvent::Presence(_)
            | ProtocolEvent::ChatPresence(_)
            | ProtocolEvent::HistorySync(_)
            | ProtocolEvent::CallOffer(_)
            | ProtocolEvent::GroupInfo(_)
            | ProtocolEvent::JoinedGroup(_) => None,
        }
    }
}

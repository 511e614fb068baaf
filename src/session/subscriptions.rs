//! Webhook event subscriptions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::EventKind;

/// The set of event types a session forwards to its webhook.
///
/// May contain the wildcard [`Subscriptions::WILDCARD`], which matches every
/// event type including ones enqueued externally under custom names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subscriptions(BTreeSet<String>);

impl Subscriptions {
    /// Wildcard entry matching every event type.
    pub const WILDCARD: &'static str = "All";

    /// Subscribes to everything.
    #[must_use]
    pub fn all() -> Self {
        Self(BTreeSet::from([Self::WILDCARD.to_string()]))
    }

    /// Builds a subscription set from event names.
    ///
    /// Names that are neither a known [`EventKind`] nor the wildcard are
    /// dropped, so stored subscriptions only ever hold valid entries.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| name == Self::WILDCARD || name.parse::<EventKind>().is_ok())
            .collect();
        Self(set)
    }

    /// Parses a comma-separated list, e.g. `"Message,Connected"`.
    #[must_use]
    pub fn parse_list(list: &str) -> Self {
        Self::from_names(list.split(','))
    }

    /// Returns true if events of `event_type` should be delivered.
    #[must_use]
    pub fn allows(&self, event_type: &str) -> bool {
        self.0.contains(Self::WILDCARD) || self.0.contains(event_type)
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates subscribed names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

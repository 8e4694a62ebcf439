use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a published or connection-local event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Synthetic first event on a new stream; never logged
    Connected,
    /// A Q profile user was provisioned
    UserCreated,
    /// A Q profile user was removed
    UserDeleted,
    /// Keep-alive on an idle stream; never logged
    Heartbeat,
}

impl EventKind {
    /// Wire name used as the SSE `event:` field
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::UserCreated => "user_created",
            Self::UserDeleted => "user_deleted",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable event, fanned out to all live subscribers.
///
/// `sequence` is assigned at append time and strictly increases across
/// the shared log. Connection-local events (connected, heartbeat) carry
/// no sequence number and never enter the shared log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// An event appended to the shared log
    #[must_use]
    pub fn logged(sequence: u64, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            sequence: Some(sequence),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// A connection-local event, visible to one stream only
    #[must_use]
    pub fn connection_local(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            sequence: None,
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(EventKind::Connected.as_str(), "connected");
        assert_eq!(EventKind::UserCreated.as_str(), "user_created");
        assert_eq!(EventKind::UserDeleted.as_str(), "user_deleted");
        assert_eq!(EventKind::Heartbeat.as_str(), "heartbeat");
    }

    #[test]
    fn test_logged_event_serializes_sequence() {
        let event = Event::logged(7, EventKind::UserCreated, serde_json::json!({"id": "abc"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["kind"], "user_created");
    }

    #[test]
    fn test_connection_local_event_omits_sequence() {
        let event = Event::connection_local(EventKind::Heartbeat, serde_json::json!({}));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("sequence").is_none());
        assert_eq!(json["kind"], "heartbeat");
    }
}

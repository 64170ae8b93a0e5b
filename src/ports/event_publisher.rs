//! LiveEventPublisher port - pushing lifecycle and configuration changes to
//! operator dashboards.
//!
//! Publishing never blocks and never fails from the caller's point of view:
//! a recipient that cannot keep up is dropped by the adapter.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Kind of a live event, rendered as the `type` field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    SessionUpdate,
    GroupUpdate,
    PolicyUpdate,
}

impl LiveEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveEventKind::SessionUpdate => "session_update",
            LiveEventKind::GroupUpdate => "group_update",
            LiveEventKind::PolicyUpdate => "policy_update",
        }
    }
}

impl fmt::Display for LiveEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: LiveEventKind,
    pub data: Value,
}

impl LiveEvent {
    pub fn new(kind: LiveEventKind, data: Value) -> Self {
        Self { kind, data }
    }
}

/// Port for publishing live events.
pub trait LiveEventPublisher: Send + Sync {
    fn publish(&self, event: LiveEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn LiveEventPublisher) {}

    #[test]
    fn event_serializes_type_and_data() {
        let event = LiveEvent::new(LiveEventKind::PolicyUpdate, json!({"groupId": "g1"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "policy_update");
        assert_eq!(value["data"]["groupId"], "g1");
    }
}

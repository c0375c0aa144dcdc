//! The typed domain event fanned out to room subscribers.
//!
//! Adjacently tagged so the wire form matches the dispatch envelope:
//! `{"t": "taskCreated", "d": {...}}`. Consumers get compile-time
//! exhaustiveness over the four event kinds.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessageRecord;
use crate::task::TaskRecord;

/// Payload of a `taskDeleted` event. Carries the project id so routing
/// never needs to consult local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDeleted {
    pub id: i64,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum DomainEvent {
    #[serde(rename = "taskCreated")]
    TaskCreated(TaskRecord),
    #[serde(rename = "taskUpdated")]
    TaskUpdated(TaskRecord),
    #[serde(rename = "taskDeleted")]
    TaskDeleted(TaskDeleted),
    #[serde(rename = "receiveMessage")]
    ChatMessageSent(ChatMessageRecord),
}

impl DomainEvent {
    /// Wire-level event name, for logging and the dispatch envelope.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::TaskCreated(_) => "taskCreated",
            DomainEvent::TaskUpdated(_) => "taskUpdated",
            DomainEvent::TaskDeleted(_) => "taskDeleted",
            DomainEvent::ChatMessageSent(_) => "receiveMessage",
        }
    }

    /// The room this event belongs to.
    pub fn project_id(&self) -> &str {
        match self {
            DomainEvent::TaskCreated(t) | DomainEvent::TaskUpdated(t) => &t.project_id,
            DomainEvent::TaskDeleted(d) => &d.project_id,
            DomainEvent::ChatMessageSent(m) => &m.project_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::Utc;

    fn task() -> TaskRecord {
        TaskRecord {
            id: 42,
            project_id: "prj_1".to_string(),
            content: "write the report".to_string(),
            status: TaskStatus::ToDo,
            assignee: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn events_tag_with_wire_names() {
        let v = serde_json::to_value(DomainEvent::TaskCreated(task())).unwrap();
        assert_eq!(v["t"], "taskCreated");
        assert_eq!(v["d"]["id"], 42);

        let v = serde_json::to_value(DomainEvent::TaskDeleted(TaskDeleted {
            id: 42,
            project_id: "prj_1".to_string(),
        }))
        .unwrap();
        assert_eq!(v["t"], "taskDeleted");
    }

    #[test]
    fn chat_event_uses_receive_message_name() {
        let event = DomainEvent::ChatMessageSent(ChatMessageRecord {
            id: 7,
            project_id: "prj_1".to_string(),
            user_id: "usr_bob".to_string(),
            user_name: "Bob".to_string(),
            content: "hi".to_string(),
            created_at: Utc::now(),
        });
        assert_eq!(event.name(), "receiveMessage");
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["t"], "receiveMessage");
    }

    #[test]
    fn event_round_trips() {
        let event = DomainEvent::TaskUpdated(task());
        let json = serde_json::to_string(&event).unwrap();
        let back: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.project_id(), "prj_1");
    }
}

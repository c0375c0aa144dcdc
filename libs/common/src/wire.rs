//! Gateway opcodes and wire-format frames, shared by server and client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::DomainEvent;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_JOIN: u8 = 3;
pub const OP_LEAVE: u8 = 4;
pub const OP_SEND_MESSAGE: u8 = 5;
pub const OP_HEARTBEAT_ACK: u8 = 6;
pub const OP_ERROR: u8 = 7;

/// Event name used for the post-IDENTIFY dispatch.
pub const EVENT_READY: &str = "ready";

// ---------------------------------------------------------------------------
// Server → Client frame
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

impl ServerFrame {
    /// Build a DISPATCH frame (op=0) from a domain event.
    pub fn dispatch(event: &DomainEvent) -> Self {
        let d = match event {
            DomainEvent::TaskCreated(t) | DomainEvent::TaskUpdated(t) => serde_json::to_value(t),
            DomainEvent::TaskDeleted(d) => serde_json::to_value(d),
            DomainEvent::ChatMessageSent(m) => serde_json::to_value(m),
        };
        Self {
            op: OP_DISPATCH,
            t: Some(event.name().to_string()),
            d: d.unwrap_or(Value::Null),
        }
    }

    /// Build the READY dispatch sent after a successful IDENTIFY.
    pub fn ready(payload: &ReadyPayload) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(EVENT_READY.to_string()),
            d: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    /// Build a HEARTBEAT_ACK frame (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }

    /// Build an ERROR frame (op=7) for the initiating session only.
    pub fn error(message: &str) -> Self {
        Self {
            op: OP_ERROR,
            t: None,
            d: serde_json::json!({ "message": message }),
        }
    }

    /// Reconstruct the typed event from a DISPATCH frame.
    ///
    /// Returns `None` for non-dispatch frames, the READY dispatch, and
    /// unknown event names (a newer server is allowed to send kinds this
    /// client does not know).
    pub fn domain_event(&self) -> Option<DomainEvent> {
        if self.op != OP_DISPATCH {
            return None;
        }
        let t = self.t.as_deref()?;
        if t == EVENT_READY {
            return None;
        }
        serde_json::from_value(serde_json::json!({ "t": t, "d": self.d })).ok()
    }
}

/// Payload of the READY dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user: ReadyUser,
    /// Interval (ms) at which the client must heartbeat.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Client → Server frame
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

impl ClientFrame {
    pub fn identify(token: &str) -> Self {
        Self {
            op: OP_IDENTIFY,
            d: serde_json::json!({ "token": token }),
        }
    }

    pub fn join(project_id: &str) -> Self {
        Self {
            op: OP_JOIN,
            d: serde_json::json!({ "project_id": project_id }),
        }
    }

    pub fn leave(project_id: &str) -> Self {
        Self {
            op: OP_LEAVE,
            d: serde_json::json!({ "project_id": project_id }),
        }
    }

    pub fn send_message(project_id: &str, content: &str) -> Self {
        Self {
            op: OP_SEND_MESSAGE,
            d: serde_json::json!({ "project_id": project_id, "content": content }),
        }
    }

    pub fn heartbeat(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT,
            d: serde_json::json!({ "seq": seq }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinPayload {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LeavePayload {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub project_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessageRecord;
    use chrono::Utc;

    #[test]
    fn dispatch_frame_round_trips_to_domain_event() {
        let event = DomainEvent::ChatMessageSent(ChatMessageRecord {
            id: 7,
            project_id: "prj_42".to_string(),
            user_id: "usr_bob".to_string(),
            user_name: "Bob".to_string(),
            content: "hi @Alice".to_string(),
            created_at: Utc::now(),
        });

        let frame = ServerFrame::dispatch(&event);
        assert_eq!(frame.op, OP_DISPATCH);
        assert_eq!(frame.t.as_deref(), Some("receiveMessage"));

        let json = serde_json::to_string(&frame).unwrap();
        let parsed: ServerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.domain_event(), Some(event));
    }

    #[test]
    fn ready_frame_is_not_a_domain_event() {
        let frame = ServerFrame::ready(&ReadyPayload {
            session_id: "ses_1".to_string(),
            user: ReadyUser {
                id: "usr_1".to_string(),
                display_name: "Bob".to_string(),
            },
            heartbeat_interval: 41250,
        });
        assert!(frame.domain_event().is_none());
    }

    #[test]
    fn unknown_event_names_are_ignored() {
        let frame = ServerFrame {
            op: OP_DISPATCH,
            t: Some("somethingNew".to_string()),
            d: serde_json::json!({}),
        };
        assert!(frame.domain_event().is_none());
    }

    #[test]
    fn client_frames_parse_into_payloads() {
        let frame = ClientFrame::join("prj_42");
        let payload: JoinPayload = serde_json::from_value(frame.d).unwrap();
        assert_eq!(payload.project_id, "prj_42");

        let frame = ClientFrame::send_message("prj_42", "hello");
        let payload: SendMessagePayload = serde_json::from_value(frame.d).unwrap();
        assert_eq!(payload.content, "hello");
    }
}

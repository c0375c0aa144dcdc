//! Broadcast hub for dispatching domain events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by room membership, so per-room
//! ordering is exactly `publish` invocation order in this single-process
//! deployment. Multi-node fan-out would need an external backplane.

use std::sync::Arc;

use crewboard_common::DomainEvent;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// An event addressed to one room.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// The project (room) this event belongs to.
    pub project_id: String,
    pub event: DomainEvent,
}

/// The global broadcast hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct RoomBroadcast {
    sender: broadcast::Sender<Arc<RoomEvent>>,
}

impl RoomBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each gateway session should call
    /// this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomEvent>> {
        self.sender.subscribe()
    }

    /// Dispatch an event to every session subscribed to the room,
    /// including the mutation's own originating session. Delivery is
    /// best-effort; callers must have persisted already.
    pub fn publish(&self, project_id: &str, event: DomainEvent) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(RoomEvent {
            project_id: project_id.to_string(),
            event,
        }));
    }
}

impl Default for RoomBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewboard_common::TaskDeleted;

    fn deleted(project_id: &str, id: i64) -> DomainEvent {
        DomainEvent::TaskDeleted(TaskDeleted {
            id,
            project_id: project_id.to_string(),
        })
    }

    #[tokio::test]
    async fn publish_without_receivers_does_not_fail() {
        let hub = RoomBroadcast::new();
        hub.publish("prj_1", deleted("prj_1", 1));
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_publish_order() {
        let hub = RoomBroadcast::new();
        let mut rx = hub.subscribe();

        for id in 1..=3 {
            hub.publish("prj_1", deleted("prj_1", id));
        }

        for expected in 1..=3 {
            let received = rx.recv().await.unwrap();
            assert_eq!(received.project_id, "prj_1");
            match &received.event {
                DomainEvent::TaskDeleted(d) => assert_eq!(d.id, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn each_subscriber_gets_every_event() {
        let hub = RoomBroadcast::new();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.publish("prj_9", deleted("prj_9", 7));

        assert_eq!(rx1.recv().await.unwrap().project_id, "prj_9");
        assert_eq!(rx2.recv().await.unwrap().project_id, "prj_9");
    }
}

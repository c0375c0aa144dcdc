//! Unread/mention tracking for inactive rooms.
//!
//! State is keyed by project id and lives only as long as the session —
//! nothing is persisted server-side, so a reconnect starts from zero.

use std::collections::HashMap;

use crewboard_common::chat::ChatMessageRecord;

/// Counters for one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomNotifications {
    /// Mentions of the local user since the room was last activated.
    pub unread: u32,
    /// Any message arrived since the room was last activated.
    pub has_new: bool,
}

pub struct NotificationTracker {
    display_name: String,
    rooms: HashMap<String, RoomNotifications>,
}

impl NotificationTracker {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            rooms: HashMap::new(),
        }
    }

    /// Record a message for a room that is NOT currently active.
    ///
    /// `has_new` is set unconditionally; `unread` increments only when the
    /// content mentions the local user (`@<display_name>` substring).
    pub fn on_message(&mut self, project_id: &str, message: &ChatMessageRecord) {
        let entry = self.rooms.entry(project_id.to_string()).or_default();
        entry.has_new = true;
        if message.mentions(&self.display_name) {
            entry.unread += 1;
        }
    }

    /// Activating a room resets its counters.
    pub fn activate(&mut self, project_id: &str) {
        self.rooms.insert(project_id.to_string(), RoomNotifications::default());
    }

    pub fn room(&self, project_id: &str) -> RoomNotifications {
        self.rooms.get(project_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(content: &str) -> ChatMessageRecord {
        ChatMessageRecord {
            id: 1,
            project_id: "prj_42".to_string(),
            user_id: "usr_bob".to_string(),
            user_name: "Bob".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mention_increments_unread_and_sets_has_new() {
        let mut tracker = NotificationTracker::new("Alice");
        tracker.on_message("prj_42", &message("hi @Alice"));

        let room = tracker.room("prj_42");
        assert_eq!(room.unread, 1);
        assert!(room.has_new);
    }

    #[test]
    fn non_mention_sets_has_new_only() {
        let mut tracker = NotificationTracker::new("Alice");
        tracker.on_message("prj_42", &message("hi everyone"));

        let room = tracker.room("prj_42");
        assert_eq!(room.unread, 0);
        assert!(room.has_new);
    }

    #[test]
    fn unread_is_monotonic_until_activation() {
        let mut tracker = NotificationTracker::new("Alice");
        tracker.on_message("prj_42", &message("hi @Alice"));
        tracker.on_message("prj_42", &message("nothing for you"));
        tracker.on_message("prj_42", &message("@Alice again"));

        assert_eq!(tracker.room("prj_42").unread, 2);
    }

    #[test]
    fn activation_resets_counters() {
        let mut tracker = NotificationTracker::new("Alice");
        tracker.on_message("prj_42", &message("hi @Alice"));
        tracker.activate("prj_42");

        let room = tracker.room("prj_42");
        assert_eq!(room.unread, 0);
        assert!(!room.has_new);
    }

    #[test]
    fn rooms_are_tracked_independently() {
        let mut tracker = NotificationTracker::new("Alice");
        tracker.on_message("prj_42", &message("hi @Alice"));
        tracker.on_message("prj_7", &message("ping"));

        assert_eq!(tracker.room("prj_42").unread, 1);
        assert_eq!(tracker.room("prj_7").unread, 0);
        assert!(tracker.room("prj_7").has_new);
        assert_eq!(tracker.room("prj_unknown"), RoomNotifications::default());
    }
}

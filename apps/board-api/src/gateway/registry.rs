//! Room registry: which connected session is subscribed to which project.
//!
//! Membership here is ephemeral — rebuilt from JOIN frames each connection
//! lifetime and gone when the session disconnects. The store is the ground
//! truth for who belongs to a project; this map only routes live events.

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Per-session metadata and joined-room set.
pub struct SessionEntry {
    pub session_id: String,
    pub user_id: String,
    pub display_name: String,
    pub rooms: HashSet<String>,
}

/// Shared registry of all gateway sessions.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry for non-poisoning, fast locking. Created once at service start and
/// passed explicitly wherever membership is consulted.
pub struct RoomRegistry {
    sessions: DashMap<String, Mutex<SessionEntry>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a new session after IDENTIFY. Starts with no joined rooms.
    pub fn register(&self, session_id: String, user_id: String, display_name: String) {
        let entry = SessionEntry {
            session_id: session_id.clone(),
            user_id,
            display_name,
            rooms: HashSet::new(),
        };
        self.sessions.insert(session_id, Mutex::new(entry));
    }

    /// Subscribe a session to a room. Idempotent.
    pub fn join(&self, session_id: &str, project_id: &str) {
        if let Some(entry) = self.sessions.get(session_id) {
            entry.lock().rooms.insert(project_id.to_string());
        }
    }

    /// Unsubscribe a session from a room. No-op if it was not joined.
    pub fn leave(&self, session_id: &str, project_id: &str) {
        if let Some(entry) = self.sessions.get(session_id) {
            entry.lock().rooms.remove(project_id);
        }
    }

    /// Drop a session entirely (disconnect): leaves every room.
    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Whether a session should receive events for a given room.
    pub fn is_member(&self, session_id: &str, project_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|entry| entry.lock().rooms.contains(project_id))
            .unwrap_or(false)
    }

    /// Current session ids subscribed to a room.
    pub fn members_of(&self, project_id: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter_map(|entry| {
                let e = entry.lock();
                e.rooms
                    .contains(project_id)
                    .then(|| e.session_id.clone())
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_session(session_id: &str) -> RoomRegistry {
        let registry = RoomRegistry::new();
        registry.register(
            session_id.to_string(),
            "usr_1".to_string(),
            "Bob".to_string(),
        );
        registry
    }

    #[test]
    fn join_is_idempotent() {
        let registry = registry_with_session("ses_a");
        registry.join("ses_a", "prj_42");
        registry.join("ses_a", "prj_42");
        assert!(registry.is_member("ses_a", "prj_42"));
        assert_eq!(registry.members_of("prj_42"), vec!["ses_a".to_string()]);
    }

    #[test]
    fn leave_removes_one_room() {
        let registry = registry_with_session("ses_a");
        registry.join("ses_a", "prj_1");
        registry.join("ses_a", "prj_2");
        registry.leave("ses_a", "prj_1");
        assert!(!registry.is_member("ses_a", "prj_1"));
        assert!(registry.is_member("ses_a", "prj_2"));
    }

    #[test]
    fn leave_unjoined_room_is_a_noop() {
        let registry = registry_with_session("ses_a");
        registry.leave("ses_a", "prj_1");
        assert!(!registry.is_member("ses_a", "prj_1"));
    }

    #[test]
    fn remove_leaves_all_rooms() {
        let registry = registry_with_session("ses_a");
        registry.join("ses_a", "prj_1");
        registry.join("ses_a", "prj_2");
        registry.remove("ses_a");
        assert!(!registry.is_member("ses_a", "prj_1"));
        assert!(registry.members_of("prj_2").is_empty());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn members_of_sees_only_joined_sessions() {
        let registry = RoomRegistry::new();
        registry.register("ses_a".to_string(), "usr_1".to_string(), "Bob".to_string());
        registry.register("ses_b".to_string(), "usr_2".to_string(), "Carol".to_string());
        registry.join("ses_a", "prj_42");

        let members = registry.members_of("prj_42");
        assert_eq!(members, vec!["ses_a".to_string()]);
    }

    #[test]
    fn unknown_session_is_never_a_member() {
        let registry = RoomRegistry::new();
        registry.join("ses_ghost", "prj_1");
        assert!(!registry.is_member("ses_ghost", "prj_1"));
    }
}

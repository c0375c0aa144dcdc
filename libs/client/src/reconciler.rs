//! Idempotent application of inbound events to local room state.
//!
//! The reconciler holds the authoritative-for-this-client view of the
//! active room. Conflicts resolve silently: an update for an unknown id
//! upserts, a delete of an absent id is a no-op, a create for a known id
//! is a no-op. Those rules absorb the races between a local optimistic
//! mutation and the matching inbound event.

use std::collections::BTreeMap;

use crewboard_common::chat::ChatMessageRecord;
use crewboard_common::task::{TaskRecord, TaskStatus};
use crewboard_common::DomainEvent;

pub struct Reconciler {
    /// Stable id of the local user; own inbound chat messages are
    /// suppressed because they were already appended from the mutation
    /// response.
    user_id: String,
    tasks: BTreeMap<i64, TaskRecord>,
    /// Ascending by id, deduplicated.
    messages: Vec<ChatMessageRecord>,
}

impl Reconciler {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tasks: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    /// Apply one inbound event. Never fails; conflicts resolve to no-ops.
    pub fn apply(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::TaskCreated(task) => {
                // No-op if already present: guards the race between a local
                // create (appended from the response) and its broadcast.
                self.tasks.entry(task.id).or_insert_with(|| task.clone());
            }
            DomainEvent::TaskUpdated(task) => {
                self.tasks.insert(task.id, task.clone());
            }
            DomainEvent::TaskDeleted(deleted) => {
                self.tasks.remove(&deleted.id);
            }
            DomainEvent::ChatMessageSent(message) => {
                if message.user_id == self.user_id {
                    // Already appended from the synchronous send response.
                    return;
                }
                self.insert_message(message.clone());
            }
        }
    }

    /// Append a message keeping id order; duplicate ids are dropped.
    pub fn insert_message(&mut self, message: ChatMessageRecord) {
        match self.messages.binary_search_by_key(&message.id, |m| m.id) {
            Ok(_) => {}
            Err(pos) => self.messages.insert(pos, message),
        }
    }

    /// Upsert a canonical task record (mutation responses).
    pub fn upsert_task(&mut self, task: TaskRecord) {
        self.tasks.insert(task.id, task);
    }

    /// Optimistically move a task to a new column. Returns false if the
    /// task is unknown locally.
    pub fn set_status_local(&mut self, task_id: i64, status: TaskStatus) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// Optimistically drop a task. No-op if absent.
    pub fn remove_task_local(&mut self, task_id: i64) {
        self.tasks.remove(&task_id);
    }

    /// Wholesale replacement from a fresh authoritative read — the only
    /// rollback mechanism.
    pub fn replace_all(&mut self, tasks: Vec<TaskRecord>, messages: Vec<ChatMessageRecord>) {
        self.tasks = tasks.into_iter().map(|t| (t.id, t)).collect();
        let mut messages = messages;
        messages.sort_by_key(|m| m.id);
        messages.dedup_by_key(|m| m.id);
        self.messages = messages;
    }

    pub fn tasks(&self) -> Vec<&TaskRecord> {
        self.tasks.values().collect()
    }

    pub fn task(&self, task_id: i64) -> Option<&TaskRecord> {
        self.tasks.get(&task_id)
    }

    pub fn messages(&self) -> &[ChatMessageRecord] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crewboard_common::TaskDeleted;

    fn task(id: i64, content: &str, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id,
            project_id: "prj_1".to_string(),
            content: content.to_string(),
            status,
            assignee: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(id: i64, user_id: &str, content: &str) -> ChatMessageRecord {
        ChatMessageRecord {
            id,
            project_id: "prj_1".to_string(),
            user_id: user_id.to_string(),
            user_name: "Someone".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn replaying_persist_order_matches_final_store_state() {
        // The same event sequence the store saw, replayed from empty.
        let events = vec![
            DomainEvent::TaskCreated(task(1, "a", TaskStatus::ToDo)),
            DomainEvent::TaskCreated(task(2, "b", TaskStatus::ToDo)),
            DomainEvent::TaskUpdated(task(1, "a", TaskStatus::InProgress)),
            DomainEvent::TaskDeleted(TaskDeleted {
                id: 2,
                project_id: "prj_1".to_string(),
            }),
            DomainEvent::TaskUpdated(task(3, "c", TaskStatus::Done)),
        ];

        let mut reconciler = Reconciler::new("usr_local");
        for event in &events {
            reconciler.apply(event);
        }

        let tasks = reconciler.tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 1);
        assert_eq!(tasks[0].status, TaskStatus::InProgress);
        assert_eq!(tasks[1].id, 3);
        assert_eq!(tasks[1].status, TaskStatus::Done);
    }

    #[test]
    fn applying_the_same_update_twice_is_idempotent() {
        let mut reconciler = Reconciler::new("usr_local");
        let event = DomainEvent::TaskUpdated(task(1, "a", TaskStatus::Done));

        reconciler.apply(&event);
        let once: Vec<TaskRecord> = reconciler.tasks().into_iter().cloned().collect();
        reconciler.apply(&event);
        let twice: Vec<TaskRecord> = reconciler.tasks().into_iter().cloned().collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn create_for_existing_id_is_a_noop() {
        let mut reconciler = Reconciler::new("usr_local");
        reconciler.upsert_task(task(1, "local", TaskStatus::InProgress));
        reconciler.apply(&DomainEvent::TaskCreated(task(1, "stale", TaskStatus::ToDo)));

        assert_eq!(reconciler.task(1).unwrap().content, "local");
        assert_eq!(reconciler.task(1).unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn update_for_unknown_id_upserts() {
        let mut reconciler = Reconciler::new("usr_local");
        reconciler.apply(&DomainEvent::TaskUpdated(task(9, "late join", TaskStatus::ToDo)));
        assert!(reconciler.task(9).is_some());
    }

    #[test]
    fn delete_of_absent_id_is_a_noop() {
        let mut reconciler = Reconciler::new("usr_local");
        reconciler.apply(&DomainEvent::TaskDeleted(TaskDeleted {
            id: 404,
            project_id: "prj_1".to_string(),
        }));
        assert!(reconciler.tasks().is_empty());
    }

    #[test]
    fn own_inbound_message_is_suppressed() {
        let mut reconciler = Reconciler::new("usr_bob");

        // Appended from the synchronous mutation response...
        reconciler.insert_message(message(7, "usr_bob", "hi @Alice"));
        // ...then the broadcast copy arrives.
        reconciler.apply(&DomainEvent::ChatMessageSent(message(7, "usr_bob", "hi @Alice")));

        assert_eq!(reconciler.messages().len(), 1);
    }

    #[test]
    fn other_users_messages_are_appended_in_id_order() {
        let mut reconciler = Reconciler::new("usr_bob");
        reconciler.apply(&DomainEvent::ChatMessageSent(message(5, "usr_carol", "second")));
        reconciler.apply(&DomainEvent::ChatMessageSent(message(3, "usr_carol", "first")));

        let ids: Vec<i64> = reconciler.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn replace_all_discards_local_state_wholesale() {
        let mut reconciler = Reconciler::new("usr_bob");
        reconciler.upsert_task(task(1, "optimistic", TaskStatus::Done));
        reconciler.insert_message(message(1, "usr_carol", "old"));

        reconciler.replace_all(
            vec![task(2, "authoritative", TaskStatus::ToDo)],
            vec![message(9, "usr_carol", "fresh")],
        );

        assert!(reconciler.task(1).is_none());
        assert_eq!(reconciler.task(2).unwrap().content, "authoritative");
        assert_eq!(reconciler.messages().len(), 1);
        assert_eq!(reconciler.messages()[0].id, 9);
    }
}

//! The client sync surface: active-room lifecycle, optimistic mutation
//! with rollback-by-refetch, and routing of inbound events.

use std::sync::Arc;

use crewboard_common::chat::ChatMessageRecord;
use crewboard_common::task::{TaskRecord, TaskStatus};
use crewboard_common::DomainEvent;

use crate::api::{RemoteStore, TaskDraft, TaskPatch};
use crate::error::ClientError;
use crate::notifications::{NotificationTracker, RoomNotifications};
use crate::reconciler::Reconciler;
use crate::transport::Connection;

pub struct SyncClient {
    user_id: String,
    active_project: Option<String>,
    reconciler: Reconciler,
    notifications: NotificationTracker,
    store: Arc<dyn RemoteStore>,
    transport: Option<Connection>,
}

impl SyncClient {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            reconciler: Reconciler::new(user_id.clone()),
            notifications: NotificationTracker::new(display_name),
            user_id,
            active_project: None,
            store,
            transport: None,
        }
    }

    /// Attach a live gateway connection. Joins are sent through it; without
    /// one the client still works for direct event application (tests, or
    /// an embedding that owns its own transport).
    pub fn attach_transport(&mut self, connection: Connection) {
        self.transport = Some(connection);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn active_project(&self) -> Option<&str> {
        self.active_project.as_deref()
    }

    pub fn tasks(&self) -> Vec<&TaskRecord> {
        self.reconciler.tasks()
    }

    pub fn messages(&self) -> &[ChatMessageRecord] {
        self.reconciler.messages()
    }

    pub fn notifications(&self, project_id: &str) -> RoomNotifications {
        self.notifications.room(project_id)
    }

    /// Subscribe to a room's events without activating it (unread/mention
    /// tracking needs the events of inactive rooms too).
    pub fn join(&self, project_id: &str) -> Result<(), ClientError> {
        if let Some(transport) = &self.transport {
            transport.join(project_id)?;
        }
        Ok(())
    }

    /// Make a room the active one: reset its counters, (re-)issue a join so
    /// future events keep arriving, and load authoritative state over REST.
    /// The fresh fetch is also the entire recovery path after a reconnect.
    pub async fn activate_project(&mut self, project_id: &str) -> Result<(), ClientError> {
        self.join(project_id)?;
        self.notifications.activate(project_id);

        let tasks = self.store.fetch_tasks(project_id).await?;
        let messages = self.store.fetch_messages(project_id).await?;
        self.reconciler.replace_all(tasks, messages);
        self.active_project = Some(project_id.to_string());
        Ok(())
    }

    /// Apply one inbound event. Events for the active room reconcile local
    /// state; chat for inactive rooms feeds the notification tracker; task
    /// events for inactive rooms are dropped (activation refetches anyway).
    pub fn apply_inbound(&mut self, event: DomainEvent) {
        let is_active = self
            .active_project
            .as_deref()
            .is_some_and(|active| active == event.project_id());

        if is_active {
            self.reconciler.apply(&event);
            return;
        }

        if let DomainEvent::ChatMessageSent(message) = &event {
            self.notifications.on_message(&message.project_id, message);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a task. The canonical record from the response is appended
    /// locally; the matching broadcast then no-ops by id.
    pub async fn create_task(&mut self, draft: TaskDraft) -> Result<TaskRecord, ClientError> {
        let project_id = self.require_active()?.to_string();
        let record = self.store.create_task(&project_id, &draft).await?;
        self.reconciler.upsert_task(record.clone());
        Ok(record)
    }

    /// Move a task to another column, optimistically. On persistence
    /// failure, local state is discarded and replaced by a fresh read.
    pub async fn move_task(
        &mut self,
        task_id: i64,
        status: TaskStatus,
    ) -> Result<(), ClientError> {
        let project_id = self.require_active()?.to_string();
        self.reconciler.set_status_local(task_id, status);

        let patch = TaskPatch {
            status: Some(status),
            ..TaskPatch::default()
        };
        match self.store.update_task(&project_id, task_id, &patch).await {
            Ok(record) => {
                self.reconciler.upsert_task(record);
                Ok(())
            }
            Err(err) => {
                self.rollback_refetch(&project_id).await;
                Err(err)
            }
        }
    }

    /// Edit task fields, optimistically.
    pub async fn edit_task(&mut self, task_id: i64, patch: TaskPatch) -> Result<(), ClientError> {
        let project_id = self.require_active()?.to_string();

        if let Some(local) = self.reconciler.task(task_id) {
            let mut updated = local.clone();
            if let Some(content) = &patch.content {
                updated.content = content.clone();
            }
            if let Some(status) = patch.status {
                updated.status = status;
            }
            if let Some(assignee) = &patch.assignee {
                updated.assignee = Some(assignee.clone());
            }
            if let Some(due_date) = patch.due_date {
                updated.due_date = Some(due_date);
            }
            self.reconciler.upsert_task(updated);
        }

        match self.store.update_task(&project_id, task_id, &patch).await {
            Ok(record) => {
                self.reconciler.upsert_task(record);
                Ok(())
            }
            Err(err) => {
                self.rollback_refetch(&project_id).await;
                Err(err)
            }
        }
    }

    /// Delete a task, optimistically.
    pub async fn delete_task(&mut self, task_id: i64) -> Result<(), ClientError> {
        let project_id = self.require_active()?.to_string();
        self.reconciler.remove_task_local(task_id);

        match self.store.delete_task(&project_id, task_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.rollback_refetch(&project_id).await;
                Err(err)
            }
        }
    }

    /// Send a chat message. Not optimistic: the canonical record from the
    /// synchronous response is appended directly, and the matching inbound
    /// broadcast is suppressed by the reconciler's own-identity rule.
    pub async fn send_message(
        &mut self,
        content: &str,
    ) -> Result<ChatMessageRecord, ClientError> {
        let project_id = self.require_active()?.to_string();
        let record = self.store.send_message(&project_id, content).await?;
        self.reconciler.insert_message(record.clone());
        Ok(record)
    }

    // -----------------------------------------------------------------------

    fn require_active(&self) -> Result<&str, ClientError> {
        self.active_project
            .as_deref()
            .ok_or(ClientError::NoActiveProject)
    }

    /// Rollback is wholesale: refetch and replace, never field-level undo.
    /// If the refetch itself fails the stale state stays; the next
    /// activation or successful refetch repairs it.
    async fn rollback_refetch(&mut self, project_id: &str) {
        let tasks = match self.store.fetch_tasks(project_id).await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(%project_id, %err, "rollback refetch failed");
                return;
            }
        };
        let messages = match self.store.fetch_messages(project_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(%project_id, %err, "rollback refetch failed");
                return;
            }
        };
        self.reconciler.replace_all(tasks, messages);
    }
}

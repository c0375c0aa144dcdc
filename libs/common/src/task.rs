//! Canonical task record as published to listeners and stored per project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kanban column a task sits in. Status only changes via an explicit
/// mutation, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    ToDo,
    #[serde(rename = "inProgress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    /// Stable string form, also used as the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "todo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "todo" => Some(TaskStatus::ToDo),
            "inProgress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// The post-persistence shape of a task, as returned by the store and
/// carried in `taskCreated` / `taskUpdated` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub project_id: String,
    pub content: String,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("doing"), None);
    }

    #[test]
    fn status_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"inProgress\""
        );
    }
}

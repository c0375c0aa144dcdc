use chrono::{DateTime, Utc};
use crewboard_common::task::{TaskRecord, TaskStatus};
use diesel::prelude::*;

use crate::db::schema::tasks;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
pub struct TaskRow {
    pub id: i64,
    pub project_id: String,
    pub content: String,
    pub status: String,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        TaskRecord {
            id: row.id,
            project_id: row.project_id,
            content: row.content,
            // The column carries a CHECK constraint, so parse only fails on
            // a hand-edited row.
            status: TaskStatus::parse(&row.status).unwrap_or_default(),
            assignee: row.assignee,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub id: i64,
    pub project_id: &'a str,
    pub content: &'a str,
    pub status: &'a str,
    pub assignee: Option<&'a str>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct UpdateTask {
    pub content: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use crewboard_common::chat::ChatMessageRecord;
use diesel::prelude::*;

use crate::db::schema::chat_messages;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessageRow {
    pub id: i64,
    pub project_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessageRecord {
    fn from(row: ChatMessageRow) -> Self {
        ChatMessageRecord {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            user_name: row.user_name,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage<'a> {
    pub id: i64,
    pub project_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

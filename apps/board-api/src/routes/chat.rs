//! Chat endpoints: message history and the persist-then-publish send path.
//!
//! `persist_and_publish` is the single mutation path for chat — both the
//! REST handler and the gateway's sendMessage opcode funnel through it, so
//! every accepted message yields exactly one canonical record on the wire.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crewboard_common::chat::ChatMessageRecord;
use crewboard_common::DomainEvent;

use crate::auth::middleware::AuthUser;
use crate::db::retry;
use crate::db::schema::chat_messages;
use crate::error::{ApiError, FieldError};
use crate::membership;
use crate::models::chat_message::{ChatMessageRow, NewChatMessage};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/projects/{project_id}/messages",
        post(send_message).get(list_messages),
    )
}

const MAX_MESSAGE_LEN: usize = 4000;

/// Persist a chat message and publish the canonical record to its room.
///
/// On persistence failure the error is returned and nothing is published.
/// Publish itself is best-effort and cannot fail the mutation.
pub(crate) async fn persist_and_publish(
    state: &AppState,
    user_id: &str,
    user_name: &str,
    project_id: &str,
    content: &str,
) -> Result<ChatMessageRecord, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: "Message content is required".to_string(),
        }]));
    }
    if content.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: format!("Message content must be {MAX_MESSAGE_LEN} characters or fewer"),
        }]));
    }

    membership::check_member(&state.db, project_id, user_id).await?;

    let id = state.snowflake.generate();
    let now = Utc::now();
    let db = &state.db;

    let row: ChatMessageRow = retry::transient(|| async move {
        let mut conn = db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(chat_messages::table)
                .values(NewChatMessage {
                    id,
                    project_id,
                    user_id,
                    user_name,
                    content,
                    created_at: now,
                })
                .returning(ChatMessageRow::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(row)
    })
    .await?;

    let record: ChatMessageRecord = row.into();
    state
        .broadcast
        .publish(project_id, DomainEvent::ChatMessageSent(record.clone()));

    Ok(record)
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects/:project_id/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/messages",
    tag = "Chat",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Canonical chat message record"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not a project member"),
    ),
)]
pub async fn send_message(
    AuthUser {
        user_id,
        display_name,
    }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessageRecord>), ApiError> {
    let record = persist_and_publish(
        &state,
        &user_id,
        &display_name,
        &project_id,
        body.content.as_deref().unwrap_or_default(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects/:project_id/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListMessagesParams {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMessagesResponse {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<ChatMessageRecord>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/messages",
    tag = "Chat",
    security(("bearer" = [])),
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("before" = Option<i64>, Query, description = "Return messages older than this id"),
        ("limit" = Option<i64>, Query, description = "Page size (1-100, default 50)"),
    ),
    responses(
        (status = 200, description = "Messages in ascending id order", body = ListMessagesResponse),
        (status = 403, description = "Not a project member"),
    ),
)]
pub async fn list_messages(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<ListMessagesParams>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let mut conn = state.db.get().await?;

    let mut query = chat_messages::table
        .filter(chat_messages::project_id.eq(&project_id))
        .order(chat_messages::id.desc())
        .limit(limit + 1)
        .select(ChatMessageRow::as_select())
        .into_boxed();

    if let Some(before) = params.before {
        query = query.filter(chat_messages::id.lt(before));
    }

    let rows: Vec<ChatMessageRow> = diesel_async::RunQueryDsl::load(query, &mut conn).await?;

    let has_more = rows.len() as i64 > limit;
    let mut data: Vec<ChatMessageRecord> = rows
        .into_iter()
        .take(limit as usize)
        .map(ChatMessageRecord::from)
        .collect();
    data.reverse(); // Return in ascending (chronological) order.

    Ok(Json(ListMessagesResponse { data, has_more }))
}

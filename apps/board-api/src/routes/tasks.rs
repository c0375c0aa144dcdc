//! Task endpoints. Mutations persist first, then publish the canonical
//! post-persistence record — never the raw request body.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::Deserialize;
use utoipa::ToSchema;

use crewboard_common::task::{TaskRecord, TaskStatus};
use crewboard_common::{DomainEvent, TaskDeleted};

use crate::auth::middleware::AuthUser;
use crate::db::retry;
use crate::db::schema::tasks;
use crate::error::{ApiError, FieldError};
use crate::membership;
use crate::models::task::{NewTask, TaskRow, UpdateTask};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/tasks",
            post(create_task).get(list_tasks),
        )
        .route(
            "/projects/{project_id}/tasks/{task_id}",
            axum::routing::patch(update_task).delete(delete_task),
        )
}

const MAX_CONTENT_LEN: usize = 2000;

fn validate_content(content: Option<&str>) -> Result<String, ApiError> {
    let content = content.map(str::trim);
    let mut errors = Vec::new();
    match content {
        None | Some("") => {
            errors.push(FieldError {
                field: "content".to_string(),
                message: "Task content is required".to_string(),
            });
        }
        Some(c) if c.len() > MAX_CONTENT_LEN => {
            errors.push(FieldError {
                field: "content".to_string(),
                message: format!("Task content must be {MAX_CONTENT_LEN} characters or fewer"),
            });
        }
        _ => {}
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(content.unwrap_or_default().to_string())
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects/:project_id/tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub content: Option<String>,
    #[schema(value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/tasks",
    tag = "Tasks",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Canonical task record"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not a project member"),
    ),
)]
pub async fn create_task(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskRecord>), ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let content = validate_content(body.content.as_deref())?;
    let status = body.status.unwrap_or_default();

    let id = state.snowflake.generate();
    let now = Utc::now();

    let db = &state.db;
    let project_id_ref = project_id.as_str();
    let content_ref = content.as_str();
    let assignee = body.assignee.as_deref();
    let due_date = body.due_date;

    let row: TaskRow = retry::transient(|| async move {
        let mut conn = db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(tasks::table)
                .values(NewTask {
                    id,
                    project_id: project_id_ref,
                    content: content_ref,
                    status: status.as_str(),
                    assignee,
                    due_date,
                    created_at: now,
                    updated_at: now,
                })
                .returning(TaskRow::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(row)
    })
    .await?;

    let record: TaskRecord = row.into();
    state
        .broadcast
        .publish(&project_id, DomainEvent::TaskCreated(record.clone()));

    Ok((StatusCode::CREATED, Json(record)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects/:project_id/tasks
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks",
    tag = "Tasks",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "All tasks for the project, oldest first"),
        (status = 403, description = "Not a project member"),
    ),
)]
pub async fn list_tasks(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<TaskRecord>>, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let mut conn = state.db.get().await?;
    let rows: Vec<TaskRow> = diesel_async::RunQueryDsl::load(
        tasks::table
            .filter(tasks::project_id.eq(&project_id))
            .order(tasks::id.asc())
            .select(TaskRow::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(rows.into_iter().map(TaskRecord::from).collect()))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/projects/:project_id/tasks/:task_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub content: Option<String>,
    #[schema(value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}",
    tag = "Tasks",
    security(("bearer" = [])),
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = i64, Path, description = "Task ID"),
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Canonical task record after the update"),
        (status = 404, description = "Task not found"),
    ),
)]
pub async fn update_task(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, i64)>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<TaskRecord>, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    if let Some(content) = body.content.as_deref() {
        validate_content(Some(content))?;
    }

    let changeset = UpdateTask {
        content: body.content.map(|c| c.trim().to_string()),
        status: body.status.map(|s| s.as_str().to_string()),
        assignee: body.assignee,
        due_date: body.due_date,
        updated_at: Utc::now(),
    };

    let db = &state.db;
    let project_id_ref = project_id.as_str();
    let changeset = &changeset;

    let row: Option<TaskRow> = retry::transient(|| async move {
        let mut conn = db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id))
                    .filter(tasks::project_id.eq(project_id_ref)),
            )
            .set(changeset)
            .returning(TaskRow::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(row)
    })
    .await?;

    let row = row.ok_or_else(|| ApiError::not_found("Task not found"))?;

    let record: TaskRecord = row.into();
    state
        .broadcast
        .publish(&project_id, DomainEvent::TaskUpdated(record.clone()));

    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/projects/:project_id/tasks/:task_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}",
    tag = "Tasks",
    security(("bearer" = [])),
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = i64, Path, description = "Task ID"),
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found"),
    ),
)]
pub async fn delete_task(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let db = &state.db;
    let project_id_ref = project_id.as_str();

    let deleted: usize = retry::transient(|| async move {
        let mut conn = db.get().await?;
        let count = diesel_async::RunQueryDsl::execute(
            diesel::delete(
                tasks::table
                    .filter(tasks::id.eq(task_id))
                    .filter(tasks::project_id.eq(project_id_ref)),
            ),
            &mut conn,
        )
        .await?;
        Ok(count)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found("Task not found"));
    }

    state.broadcast.publish(
        &project_id,
        DomainEvent::TaskDeleted(TaskDeleted {
            id: task_id,
            project_id: project_id.clone(),
        }),
    );

    Ok(StatusCode::NO_CONTENT)
}

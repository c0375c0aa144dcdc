//! Project CRUD. Conventional endpoints — the event set is closed over the
//! four sync kinds, so project metadata changes ride the next REST fetch
//! instead of a broadcast.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crewboard_common::id;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{project_members, projects};
use crate::error::{ApiError, FieldError};
use crate::membership;
use crate::models::project::{NewProject, Project, UpdateProject};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/{project_id}",
            axum::routing::get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
}

fn validate_name(name: Option<&str>) -> Result<String, ApiError> {
    let name = name.map(str::trim);
    match name {
        None | Some("") => Err(ApiError::validation(vec![FieldError {
            field: "name".to_string(),
            message: "Project name is required".to_string(),
        }])),
        Some(n) if n.len() > 100 => Err(ApiError::validation(vec![FieldError {
            field: "name".to_string(),
            message: "Project name must be 100 characters or fewer".to_string(),
        }])),
        Some(n) => Ok(n.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "Projects",
    security(("bearer" = [])),
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Validation failed"),
    ),
)]
pub async fn create_project(
    AuthUser {
        user_id,
        display_name,
    }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let name = validate_name(body.name.as_deref())?;
    let description = body.description.as_deref().map(str::trim);

    let project_id = id::prefixed_ulid(id::prefix::PROJECT);
    let now = Utc::now();

    let mut conn = state.db.get().await?;

    let project: Project = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                membership::ensure_user(conn, &user_id, &display_name).await?;

                let project: Project = diesel_async::RunQueryDsl::get_result(
                    diesel::insert_into(projects::table)
                        .values(NewProject {
                            id: &project_id,
                            name: &name,
                            description,
                            owner_id: &user_id,
                            created_at: now,
                            updated_at: now,
                        })
                        .returning(Project::as_returning()),
                    conn,
                )
                .await?;

                membership::add_member(conn, &project.id, &user_id).await?;

                Ok(project)
            }
            .scope_boxed()
        })
        .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "Projects",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Projects the caller is a member of", body = [Project]),
    ),
)]
pub async fn list_projects(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let mut conn = state.db.get().await?;

    let list: Vec<Project> = diesel_async::RunQueryDsl::load(
        projects::table
            .inner_join(project_members::table)
            .filter(project_members::user_id.eq(&user_id))
            .order(projects::created_at.asc())
            .select(Project::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(list))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects/:project_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "Not a project member"),
        (status = 404, description = "Project not found"),
    ),
)]
pub async fn get_project(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let mut conn = state.db.get().await?;
    let project: Project = diesel_async::RunQueryDsl::get_result(
        projects::table
            .find(&project_id)
            .select(Project::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/projects/:project_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = Project),
        (status = 403, description = "Only the owner can update a project"),
        (status = 404, description = "Project not found"),
    ),
)]
pub async fn update_project(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    require_owner(&state, &project_id, &user_id).await?;

    if let Some(name) = body.name.as_deref() {
        validate_name(Some(name))?;
    }

    let changeset = UpdateProject {
        name: body.name.map(|n| n.trim().to_string()),
        description: body.description,
        updated_at: Utc::now(),
    };

    let mut conn = state.db.get().await?;
    let project: Project = diesel_async::RunQueryDsl::get_result(
        diesel::update(projects::table.find(&project_id))
            .set(&changeset)
            .returning(Project::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/projects/:project_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Only the owner can delete a project"),
        (status = 404, description = "Project not found"),
    ),
)]
pub async fn delete_project(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_owner(&state, &project_id, &user_id).await?;

    let mut conn = state.db.get().await?;
    diesel_async::RunQueryDsl::execute(
        diesel::delete(projects::table.find(&project_id)),
        &mut conn,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn require_owner(state: &AppState, project_id: &str, user_id: &str) -> Result<(), ApiError> {
    let mut conn = state.db.get().await?;
    let owner_id: Option<String> = diesel_async::RunQueryDsl::get_result(
        projects::table
            .find(project_id)
            .select(projects::owner_id),
        &mut conn,
    )
    .await
    .optional()?;

    match owner_id {
        None => Err(ApiError::not_found("Project not found")),
        Some(owner) if owner != user_id => {
            Err(ApiError::forbidden("Only the project owner can do that"))
        }
        Some(_) => Ok(()),
    }
}

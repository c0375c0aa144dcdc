//! Project member listing.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{app_users, project_members};
use crate::error::ApiError;
use crate::membership;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/projects/{project_id}/members", get(list_members))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberEntry {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/members",
    tag = "Members",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project members", body = [MemberEntry]),
        (status = 403, description = "Not a project member"),
    ),
)]
pub async fn list_members(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<MemberEntry>>, ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    let mut conn = state.db.get().await?;

    let rows: Vec<(String, String, Option<String>, DateTime<Utc>)> =
        diesel_async::RunQueryDsl::load(
            project_members::table
                .inner_join(app_users::table)
                .filter(project_members::project_id.eq(&project_id))
                .order(project_members::joined_at.asc())
                .select((
                    app_users::id,
                    app_users::display_name,
                    app_users::avatar_url,
                    project_members::joined_at,
                )),
            &mut conn,
        )
        .await?;

    let members = rows
        .into_iter()
        .map(|(user_id, display_name, avatar_url, joined_at)| MemberEntry {
            user_id,
            display_name,
            avatar_url,
            joined_at,
        })
        .collect();

    Ok(Json(members))
}

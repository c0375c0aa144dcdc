//! Invitation endpoints. Accepting an invitation flips its status and
//! inserts the membership row in one transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
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
use crate::db::schema::{invitations, project_members};
use crate::error::ApiError;
use crate::membership;
use crate::models::invitation::{
    Invitation, NewInvitation, STATUS_ACCEPTED, STATUS_DECLINED, STATUS_PENDING,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/invitations",
            post(create_invitation),
        )
        .route("/invitations", get(list_invitations))
        .route("/invitations/{invitation_id}/accept", post(accept_invitation))
        .route(
            "/invitations/{invitation_id}/decline",
            post(decline_invitation),
        )
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects/:project_id/invitations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    pub invitee_id: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/invitations",
    tag = "Invitations",
    security(("bearer" = [])),
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created", body = Invitation),
        (status = 403, description = "Not a project member"),
        (status = 409, description = "Invitee is already a member"),
    ),
)]
pub async fn create_invitation(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Invitation>), ApiError> {
    membership::check_member(&state.db, &project_id, &user_id).await?;

    if body.invitee_id == user_id {
        return Err(ApiError::bad_request("Cannot invite yourself"));
    }

    let mut conn = state.db.get().await?;

    let already_member: Option<String> = diesel_async::RunQueryDsl::get_result(
        project_members::table
            .filter(project_members::project_id.eq(&project_id))
            .filter(project_members::user_id.eq(&body.invitee_id))
            .select(project_members::user_id),
        &mut conn,
    )
    .await
    .optional()?;

    if already_member.is_some() {
        return Err(ApiError::conflict("Invitee is already a member"));
    }

    let invitation: Invitation = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(invitations::table)
            .values(NewInvitation {
                id: &id::prefixed_ulid(id::prefix::INVITATION),
                project_id: &project_id,
                inviter_id: &user_id,
                invitee_id: &body.invitee_id,
                status: STATUS_PENDING,
                created_at: Utc::now(),
            })
            .returning(Invitation::as_returning()),
        &mut conn,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/invitations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/invitations",
    tag = "Invitations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending invitations addressed to the caller", body = [Invitation]),
    ),
)]
pub async fn list_invitations(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    let mut conn = state.db.get().await?;

    let list: Vec<Invitation> = diesel_async::RunQueryDsl::load(
        invitations::table
            .filter(invitations::invitee_id.eq(&user_id))
            .filter(invitations::status.eq(STATUS_PENDING))
            .order(invitations::created_at.asc())
            .select(Invitation::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(list))
}

// ---------------------------------------------------------------------------
// POST /api/v1/invitations/:invitation_id/accept
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/invitations/{invitation_id}/accept",
    tag = "Invitations",
    security(("bearer" = [])),
    params(("invitation_id" = String, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation accepted; caller is now a member", body = Invitation),
        (status = 404, description = "No pending invitation with this id for the caller"),
    ),
)]
pub async fn accept_invitation(
    AuthUser {
        user_id,
        display_name,
    }: AuthUser,
    State(state): State<AppState>,
    Path(invitation_id): Path<String>,
) -> Result<Json<Invitation>, ApiError> {
    let mut conn = state.db.get().await?;

    let invitation: Invitation = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let invitation: Invitation = diesel_async::RunQueryDsl::get_result(
                    diesel::update(
                        invitations::table
                            .filter(invitations::id.eq(&invitation_id))
                            .filter(invitations::invitee_id.eq(&user_id))
                            .filter(invitations::status.eq(STATUS_PENDING)),
                    )
                    .set((
                        invitations::status.eq(STATUS_ACCEPTED),
                        invitations::responded_at.eq(Utc::now()),
                    ))
                    .returning(Invitation::as_returning()),
                    conn,
                )
                .await
                .optional()?
                .ok_or_else(|| ApiError::not_found("Invitation not found"))?;

                membership::ensure_user(conn, &user_id, &display_name).await?;
                membership::add_member(conn, &invitation.project_id, &user_id).await?;

                Ok(invitation)
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(invitation))
}

// ---------------------------------------------------------------------------
// POST /api/v1/invitations/:invitation_id/decline
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/invitations/{invitation_id}/decline",
    tag = "Invitations",
    security(("bearer" = [])),
    params(("invitation_id" = String, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation declined", body = Invitation),
        (status = 404, description = "No pending invitation with this id for the caller"),
    ),
)]
pub async fn decline_invitation(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(invitation_id): Path<String>,
) -> Result<Json<Invitation>, ApiError> {
    let mut conn = state.db.get().await?;

    let invitation: Invitation = diesel_async::RunQueryDsl::get_result(
        diesel::update(
            invitations::table
                .filter(invitations::id.eq(&invitation_id))
                .filter(invitations::invitee_id.eq(&user_id))
                .filter(invitations::status.eq(STATUS_PENDING)),
        )
        .set((
            invitations::status.eq(STATUS_DECLINED),
            invitations::responded_at.eq(Utc::now()),
        ))
        .returning(Invitation::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Invitation not found"))?;

    Ok(Json(invitation))
}

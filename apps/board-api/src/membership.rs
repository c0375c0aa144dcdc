//! Project membership checks and identity provisioning.

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncPgConnection;

use crate::db::pool::DbPool;
use crate::db::schema::{app_users, project_members, projects};
use crate::error::ApiError;
use crate::models::app_user::NewAppUser;
use crate::models::project_member::NewProjectMember;

/// Verify the user is a member of the project.
///
/// Returns 404 for a project that does not exist and 403 for a project the
/// user is not a member of.
pub async fn check_member(db: &DbPool, project_id: &str, user_id: &str) -> Result<(), ApiError> {
    let mut conn = db.get().await?;

    let membership: Option<String> = diesel_async::RunQueryDsl::get_result(
        project_members::table
            .filter(project_members::project_id.eq(project_id))
            .filter(project_members::user_id.eq(user_id))
            .select(project_members::user_id),
        &mut conn,
    )
    .await
    .optional()?;

    if membership.is_some() {
        return Ok(());
    }

    let exists: Option<String> = diesel_async::RunQueryDsl::get_result(
        projects::table.find(project_id).select(projects::id),
        &mut conn,
    )
    .await
    .optional()?;

    if exists.is_none() {
        Err(ApiError::not_found("Project not found"))
    } else {
        Err(ApiError::forbidden("Not a project member"))
    }
}

/// Upsert the caller's identity row from their token claims. The identity
/// service owns these rows; this keeps display names usable for member
/// listings when a token arrives before provisioning has synced.
pub async fn ensure_user(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    display_name: &str,
) -> Result<(), ApiError> {
    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(app_users::table)
            .values(NewAppUser {
                id: user_id,
                display_name,
                avatar_url: None,
                created_at: Utc::now(),
            })
            .on_conflict(app_users::id)
            .do_update()
            .set(app_users::display_name.eq(display_name)),
        conn,
    )
    .await?;
    Ok(())
}

/// Insert a membership row, ignoring an existing one.
pub async fn add_member(
    conn: &mut AsyncPgConnection,
    project_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(project_members::table)
            .values(NewProjectMember {
                project_id,
                user_id,
                joined_at: Utc::now(),
            })
            .on_conflict((project_members::project_id, project_members::user_id))
            .do_nothing(),
        conn,
    )
    .await?;
    Ok(())
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::project_members;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = project_members)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = project_members)]
pub struct NewProjectMember<'a> {
    pub project_id: &'a str,
    pub user_id: &'a str,
    pub joined_at: DateTime<Utc>,
}

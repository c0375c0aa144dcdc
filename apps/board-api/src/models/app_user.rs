use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::app_users;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = app_users)]
pub struct AppUser {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = app_users)]
pub struct NewAppUser<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub avatar_url: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

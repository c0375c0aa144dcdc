pub mod chat;
pub mod health;
pub mod invitations;
pub mod members;
pub mod projects;
pub mod tasks;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            projects::router()
                .merge(members::router())
                .merge(tasks::router())
                .merge(chat::router())
                .merge(invitations::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Projects
        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        // Members
        members::list_members,
        // Tasks
        tasks::create_task,
        tasks::list_tasks,
        tasks::update_task,
        tasks::delete_task,
        // Chat
        chat::send_message,
        chat::list_messages,
        // Invitations
        invitations::create_invitation,
        invitations::list_invitations,
        invitations::accept_invitation,
        invitations::decline_invitation,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::project::Project,
            crate::models::app_user::AppUser,
            crate::models::project_member::ProjectMember,
            crate::models::invitation::Invitation,
            // Route request/response types
            health::HealthResponse,
            projects::CreateProjectRequest,
            projects::UpdateProjectRequest,
            members::MemberEntry,
            tasks::CreateTaskRequest,
            tasks::UpdateTaskRequest,
            chat::SendMessageRequest,
            chat::ListMessagesResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Projects", description = "Project management"),
        (name = "Members", description = "Project members"),
        (name = "Tasks", description = "Kanban tasks"),
        (name = "Chat", description = "Project chat"),
        (name = "Invitations", description = "Project invitations"),
    )
)]
pub struct ApiDoc;

pub mod app_user;
pub mod chat_message;
pub mod invitation;
pub mod project;
pub mod project_member;
pub mod task;

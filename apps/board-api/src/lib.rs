pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod membership;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use crewboard_common::SnowflakeGenerator;
use db::pool::DbPool;
use gateway::fanout::RoomBroadcast;
use gateway::registry::RoomRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub rooms: Arc<RoomRegistry>,
    pub broadcast: Arc<RoomBroadcast>,
}

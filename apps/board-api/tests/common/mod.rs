//! Shared helpers for integration tests.
//!
//! The gateway suite runs without a database: the pool is lazy and the
//! flows under test never check out a connection.

use std::sync::Arc;

use board_api::config::Config;
use board_api::gateway::fanout::RoomBroadcast;
use board_api::gateway::registry::RoomRegistry;
use board_api::AppState;
use crewboard_common::SnowflakeGenerator;

pub const TEST_SECRET: &str = "gateway-test-secret";

pub fn test_state() -> AppState {
    let config = Config {
        database_url: "postgres://localhost:5432/crewboard_unused".to_string(),
        auth_secret: TEST_SECRET.to_string(),
        port: 0,
    };

    AppState {
        db: board_api::db::pool::connect(&config.database_url),
        config: Arc::new(config),
        snowflake: Arc::new(SnowflakeGenerator::new(0)),
        rooms: Arc::new(RoomRegistry::new()),
        broadcast: Arc::new(RoomBroadcast::new()),
    }
}

pub fn mint_token(user_id: &str, display_name: &str) -> String {
    board_api::auth::tokens::mint(TEST_SECRET, user_id, display_name, 300).expect("mint token")
}

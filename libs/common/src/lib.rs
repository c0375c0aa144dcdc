pub mod chat;
pub mod event;
pub mod id;
pub mod snowflake;
pub mod task;
pub mod wire;

pub use event::{DomainEvent, TaskDeleted};
pub use id::PrefixedId;
pub use snowflake::SnowflakeGenerator;

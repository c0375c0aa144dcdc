//! Client-side half of the Crewboard sync core.
//!
//! The server owns persistence and fan-out; this crate owns what a client
//! does with the event stream: idempotent reconciliation of the active
//! room, optimistic mutation with rollback-by-refetch, and unread/mention
//! tracking for inactive rooms. Recovery after a disconnect is a fresh
//! REST fetch — there is no event replay.

pub mod api;
pub mod error;
pub mod notifications;
pub mod reconciler;
pub mod sync;
pub mod transport;

pub use api::{RemoteStore, RestStore, TaskDraft, TaskPatch};
pub use error::ClientError;
pub use notifications::NotificationTracker;
pub use reconciler::Reconciler;
pub use sync::SyncClient;
pub use transport::Connection;

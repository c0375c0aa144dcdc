//! IDENTIFY processing and per-connection session state.

use crewboard_common::id;
use crewboard_common::wire::{IdentifyPayload, ReadyPayload, ReadyUser, ServerFrame};

use crate::auth::tokens;
use crate::AppState;

/// Heartbeat interval sent to clients in the READY payload (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// State for a single WebSocket connection. Joined rooms live in the
/// registry, not here.
pub struct GatewaySession {
    /// Unique session identifier (`ses_` prefixed ULID).
    pub session_id: String,
    /// Authenticated user ID.
    pub user_id: String,
    /// Display name from the token claims, cached at IDENTIFY time.
    pub display_name: String,
}

/// Process an IDENTIFY opcode. Returns a (`GatewaySession`, READY frame) on
/// success. Identity comes entirely from the token claims; rooms are joined
/// explicitly afterwards, so no store access happens here.
pub fn handle_identify(
    state: &AppState,
    payload: IdentifyPayload,
) -> Result<(GatewaySession, ServerFrame), &'static str> {
    let claims = tokens::verify(&state.config.auth_secret, &payload.token)
        .map_err(|_| "Invalid or expired token")?;

    let session = GatewaySession {
        session_id: id::prefixed_ulid(id::prefix::SESSION),
        user_id: claims.sub,
        display_name: claims.name,
    };

    let ready = ServerFrame::ready(&ReadyPayload {
        session_id: session.session_id.clone(),
        user: ReadyUser {
            id: session.user_id.clone(),
            display_name: session.display_name.clone(),
        },
        heartbeat_interval: HEARTBEAT_INTERVAL_MS,
    });

    Ok((session, ready))
}

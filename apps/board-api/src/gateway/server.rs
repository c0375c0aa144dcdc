//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

use crewboard_common::wire::{
    ClientFrame, HeartbeatPayload, IdentifyPayload, JoinPayload, LeavePayload,
    SendMessagePayload, ServerFrame, OP_HEARTBEAT, OP_IDENTIFY, OP_JOIN, OP_LEAVE,
    OP_SEND_MESSAGE,
};

use crate::routes::chat;
use crate::AppState;

use super::fanout::RoomEvent;
use super::handler::{handle_identify, GatewaySession, HEARTBEAT_INTERVAL_MS};

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_UNKNOWN_OPCODE: u16 = 4001;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

/// Timeout for receiving IDENTIFY after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: Wait for IDENTIFY within the handshake timeout.
    let identify_result = time::timeout(Duration::from_secs(IDENTIFY_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during identify");
                    return Err("read error");
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err("client closed"),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            let frame: ClientFrame = match serde_json::from_str(&text) {
                Ok(f) => f,
                Err(_) => {
                    let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                    return Err("invalid json");
                }
            };

            if frame.op != OP_IDENTIFY {
                let _ = send_close(&mut ws_tx, CLOSE_NOT_AUTHENTICATED, "Expected IDENTIFY").await;
                return Err("expected identify");
            }

            let payload: IdentifyPayload =
                serde_json::from_value(frame.d).map_err(|_| "invalid identify payload")?;
            return Ok(payload);
        }
        Err("connection closed before identify")
    })
    .await;

    let payload = match identify_result {
        Ok(Ok(payload)) => payload,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "gateway handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    let (session, ready) = match handle_identify(&state, payload) {
        Ok(result) => result,
        Err(reason) => {
            tracing::debug!(%reason, "identify rejected");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
            return;
        }
    };

    tracing::info!(
        session_id = %session.session_id,
        user_id = %session.user_id,
        "gateway session established"
    );

    // Register before READY so a JOIN sent immediately after is not lost.
    state.rooms.register(
        session.session_id.clone(),
        session.user_id.clone(),
        session.display_name.clone(),
    );

    // Subscribe before sending READY so no event published after the
    // handshake can be missed.
    let broadcast_rx = state.broadcast.subscribe();

    if send_frame(&mut ws_tx, &ready).await.is_err() {
        state.rooms.remove(&session.session_id);
        return;
    }

    let session = Arc::new(session);
    run_session(session.clone(), ws_tx, ws_rx, broadcast_rx, state.clone()).await;

    // Disconnect leaves every room.
    state.rooms.remove(&session.session_id);

    tracing::info!(
        session_id = %session.session_id,
        user_id = %session.user_id,
        "gateway session ended"
    );
}

/// Main session event loop: read client frames, forward room events,
/// enforce the heartbeat deadline.
async fn run_session(
    session: Arc<GatewaySession>,
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut ws_rx: futures_util::stream::SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<Arc<RoomEvent>>,
    state: AppState,
) {
    // Frames produced by spawned units of work (mutation failures).
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();

    // Heartbeat deadline: client must heartbeat within 1.5× the interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame: ClientFrame = match serde_json::from_str(&text) {
                            Ok(f) => f,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                break;
                            }
                        };

                        match frame.op {
                            OP_HEARTBEAT => {
                                got_heartbeat = true;
                                let payload: HeartbeatPayload =
                                    serde_json::from_value(frame.d).unwrap_or(HeartbeatPayload { seq: 0 });
                                if send_frame(&mut ws_tx, &ServerFrame::heartbeat_ack(payload.seq)).await.is_err() {
                                    break;
                                }
                            }
                            OP_JOIN => {
                                match serde_json::from_value::<JoinPayload>(frame.d) {
                                    Ok(payload) => {
                                        state.rooms.join(&session.session_id, &payload.project_id);
                                        tracing::debug!(
                                            session_id = %session.session_id,
                                            project_id = %payload.project_id,
                                            "joined room"
                                        );
                                    }
                                    Err(_) => {
                                        let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JOIN payload").await;
                                        break;
                                    }
                                }
                            }
                            OP_LEAVE => {
                                if let Ok(payload) = serde_json::from_value::<LeavePayload>(frame.d) {
                                    state.rooms.leave(&session.session_id, &payload.project_id);
                                }
                            }
                            OP_SEND_MESSAGE => {
                                match serde_json::from_value::<SendMessagePayload>(frame.d) {
                                    Ok(payload) => {
                                        // Independent unit of work: the suspend on
                                        // persistence must not stall event forwarding,
                                        // and a disconnect mid-flight must not abort
                                        // the persist or the publish.
                                        let state = state.clone();
                                        let session = session.clone();
                                        let out_tx = out_tx.clone();
                                        tokio::spawn(async move {
                                            let result = chat::persist_and_publish(
                                                &state,
                                                &session.user_id,
                                                &session.display_name,
                                                &payload.project_id,
                                                &payload.content,
                                            )
                                            .await;
                                            if let Err(err) = result {
                                                tracing::debug!(
                                                    session_id = %session.session_id,
                                                    code = %err.code,
                                                    "ws sendMessage failed"
                                                );
                                                let _ = out_tx.send(ServerFrame::error(&err.message));
                                            }
                                        });
                                    }
                                    Err(_) => {
                                        let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid sendMessage payload").await;
                                        break;
                                    }
                                }
                            }
                            OP_IDENTIFY => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Already identified").await;
                                break;
                            }
                            _ => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_OPCODE, "Unknown opcode").await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, session_id = %session.session_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Room event from the fan-out hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(room_event) => {
                        if !state.rooms.is_member(&session.session_id, &room_event.project_id) {
                            continue;
                        }

                        let frame = ServerFrame::dispatch(&room_event.event);
                        if send_frame(&mut ws_tx, &frame).await.is_err() {
                            // This session is gone; others are unaffected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            session_id = %session.session_id,
                            skipped = n,
                            "gateway session lagged behind broadcast"
                        );
                        // Continue — the client recovers with a REST refetch.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // Frame from a spawned unit of work.
            Some(frame) = out_rx.recv() => {
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    break;
                }
            }

            // Heartbeat timeout check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        session_id = %session.session_id,
                        "heartbeat timeout — closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Serialize and send a single frame.
async fn send_frame(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}

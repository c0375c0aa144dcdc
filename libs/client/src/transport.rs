//! Gateway connection: identify handshake, heartbeat, and the frame →
//! event pump. The connection only transports; what the events mean is
//! the sync client's business.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crewboard_common::wire::{
    ClientFrame, ReadyPayload, ServerFrame, EVENT_READY, OP_DISPATCH, OP_ERROR,
    OP_HEARTBEAT_ACK,
};
use crewboard_common::DomainEvent;

use crate::error::ClientError;

/// Timeout for the IDENTIFY → READY exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A live gateway connection. Dropping it closes the writer side and the
/// background tasks wind down.
pub struct Connection {
    out_tx: mpsc::UnboundedSender<ClientFrame>,
}

impl Connection {
    /// Connect, IDENTIFY with the bearer token, and wait for READY.
    ///
    /// Returns the connection handle, the READY payload, and the inbound
    /// event stream. The caller drains the stream and feeds each event to
    /// its `SyncClient`.
    pub async fn connect(
        gateway_url: &str,
        token: &str,
    ) -> Result<
        (
            Connection,
            ReadyPayload,
            mpsc::UnboundedReceiver<DomainEvent>,
        ),
        ClientError,
    > {
        let (ws_stream, _) = connect_async(gateway_url).await?;
        let (mut write, mut read) = ws_stream.split();

        let identify = serde_json::to_string(&ClientFrame::identify(token))?;
        write.send(Message::Text(identify.into())).await?;

        let ready = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(msg) = read.next().await {
                let msg = msg?;
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => return Err(ClientError::ConnectionClosed),
                    _ => continue,
                };
                let frame: ServerFrame = serde_json::from_str(&text)?;
                if frame.op == OP_DISPATCH && frame.t.as_deref() == Some(EVENT_READY) {
                    let payload: ReadyPayload = serde_json::from_value(frame.d)?;
                    return Ok(payload);
                }
            }
            Err(ClientError::ConnectionClosed)
        })
        .await
        .map_err(|_| ClientError::Handshake("timed out waiting for READY".to_string()))??;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<DomainEvent>();

        // Writer: single owner of the sink.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(%err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if write.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        // Reader: frames → typed events.
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let frame: ServerFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::debug!(%err, "ignoring malformed frame");
                        continue;
                    }
                };
                match frame.op {
                    OP_DISPATCH => {
                        if let Some(event) = frame.domain_event() {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    OP_HEARTBEAT_ACK => {}
                    OP_ERROR => {
                        tracing::warn!(payload = %frame.d, "mutation rejected by gateway");
                    }
                    other => {
                        tracing::debug!(op = other, "unexpected opcode from server");
                    }
                }
            }
        });

        // Heartbeat at the interval the server announced.
        let heartbeat_tx = out_tx.clone();
        let interval = Duration::from_millis(ready.heartbeat_interval);
        tokio::spawn(async move {
            let mut seq: u64 = 0;
            let mut timer = tokio::time::interval(interval);
            timer.tick().await; // First tick fires immediately; skip it.
            loop {
                timer.tick().await;
                seq += 1;
                if heartbeat_tx.send(ClientFrame::heartbeat(seq)).is_err() {
                    break;
                }
            }
        });

        Ok((Connection { out_tx }, ready, event_rx))
    }

    /// Subscribe to a room's broadcast. Idempotent server-side.
    pub fn join(&self, project_id: &str) -> Result<(), ClientError> {
        self.send(ClientFrame::join(project_id))
    }

    pub fn leave(&self, project_id: &str) -> Result<(), ClientError> {
        self.send(ClientFrame::leave(project_id))
    }

    /// Convenience chat path over the gateway; the REST endpoint is the
    /// primary one and both produce the same canonical record.
    pub fn send_chat_message(&self, project_id: &str, content: &str) -> Result<(), ClientError> {
        self.send(ClientFrame::send_message(project_id, content))
    }

    fn send(&self, frame: ClientFrame) -> Result<(), ClientError> {
        self.out_tx
            .send(frame)
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

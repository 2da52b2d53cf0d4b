//! Per-connection handler: path routing, admission, and traffic relay.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Route the request path to a room code (creating a room for `/new`)
//!   2. Ask the room for a slot; a full room gets `full` and a close
//!   3. Loop: forward the room's outbound queue to the socket and decoded
//!      inbound frames to the room

use std::sync::Arc;

use dotbox_protocol::{notice, ClientMessage, Codec, RoomCode, ServerMessage};
use dotbox_room::{PeerOutbound, RoomError, RoomHandle, RoomStore};
use dotbox_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::DotboxError;

/// Where a request path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    /// `/new`: create a room and take its first slot.
    NewRoom,
    /// `/room/{CODE}`: join an existing (or persisted) room.
    Room(RoomCode),
}

impl Route {
    /// Parses a request path. `None` for unknown paths and malformed codes.
    pub(crate) fn parse(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        if path == "/new" {
            return Some(Self::NewRoom);
        }
        let code = path.strip_prefix("/room/")?;
        RoomCode::parse(code).ok().map(Self::Room)
    }
}

/// Reports the socket as gone when the handler exits, however it exits.
///
/// `Drop` is synchronous, so the notification goes out on a spawned task.
struct DisconnectGuard {
    handle: RoomHandle,
    conn_id: ConnectionId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let handle = self.handle.clone();
        let conn_id = self.conn_id;
        tokio::spawn(async move {
            let _ = handle.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), DotboxError>
where
    S: RoomStore,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.path(), "handling new connection");

    // --- Step 1: Routing ---
    let Some(route) = Route::parse(conn.path()) else {
        tracing::debug!(%conn_id, path = conn.path(), "unroutable path");
        send(&conn, &state.codec, &ServerMessage::error(notice::INVALID_ROOM)).await?;
        let _ = conn.close().await;
        return Ok(());
    };
    let code = match route {
        Route::NewRoom => state.directory.create_room().await?,
        Route::Room(code) => code,
    };

    // --- Step 2: Admission ---
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let handle = match state.directory.admit(&code, conn_id, tx).await {
        Ok((handle, admission)) => {
            tracing::info!(
                %conn_id,
                room = %code,
                slot = admission.player.number(),
                ready = admission.ready,
                "player admitted"
            );
            handle
        }
        Err(RoomError::RoomFull(_)) => {
            tracing::info!(%conn_id, room = %code, "room full, rejecting connection");
            send(&conn, &state.codec, &ServerMessage::Full).await?;
            let _ = conn.close().await;
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(%conn_id, room = %code, error = %e, "admission failed");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = DisconnectGuard {
        handle: handle.clone(),
        conn_id,
    };

    // --- Step 3: Relay ---
    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(PeerOutbound::Message(msg)) => {
                    if let Err(e) = send(&conn, &state.codec, &msg).await {
                        tracing::debug!(%conn_id, error = %e, "send failed");
                        break;
                    }
                }
                Some(PeerOutbound::Close) => {
                    tracing::info!(%conn_id, room = %code, "closing unresponsive connection");
                    let _ = conn.close().await;
                    break;
                }
                None => {
                    tracing::debug!(%conn_id, room = %code, "room stopped");
                    let _ = conn.close().await;
                    break;
                }
            },
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => match state.codec.decode::<ClientMessage>(&data) {
                    Ok(msg) => {
                        if handle.deliver(conn_id, msg).await.is_err() {
                            tracing::debug!(%conn_id, room = %code, "room unavailable");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "dropping malformed frame");
                    }
                },
                Ok(None) => {
                    tracing::info!(%conn_id, room = %code, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    // _guard drops here → room hears about the disconnect.
    Ok(())
}

/// Encodes and sends one server message.
async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    msg: &ServerMessage,
) -> Result<(), DotboxError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

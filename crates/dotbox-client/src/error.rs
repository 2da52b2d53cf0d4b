//! Error types for the client layer.

use dotbox_protocol::RoomCodeError;

/// User-facing client errors.
///
/// `Clone` because they travel inside [`ClientEvent`](crate::ClientEvent)s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The room already has two players.
    #[error("room is full")]
    RoomFull,

    /// The connection could not be opened at all.
    #[error("could not connect: {0}")]
    CouldNotConnect(String),

    /// Automatic reconnection gave up.
    #[error("connection lost after {0} reconnect attempts")]
    ReconnectExhausted(u32),

    /// The connection dropped before a room was known, so there is nothing
    /// to reconnect to.
    #[error("connection lost")]
    ConnectionLost,

    /// There is no open connection to send on.
    #[error("not connected to a room")]
    NotConnected,

    /// The supplied room code is malformed.
    #[error("invalid room code: {0}")]
    InvalidRoomCode(#[from] RoomCodeError),

    /// The session task has shut down.
    #[error("client session is shut down")]
    Shutdown,
}

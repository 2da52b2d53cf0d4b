//! Error types for the room layer.

use dotbox_engine::BoardError;
use dotbox_protocol::{RoomCode, RoomCodeError};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Both player slots are taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// No unused room code was found.
    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// A generated or supplied room code was malformed.
    #[error(transparent)]
    InvalidCode(#[from] RoomCodeError),

    /// The configured board dimensions are unusable.
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Errors from a [`RoomStore`](crate::RoomStore) backend.
///
/// Rooms log these and keep running on their in-memory state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted state could not be (de)serialized.
    #[error("corrupt persisted state: {0}")]
    Corrupt(#[from] serde_json::Error),
}

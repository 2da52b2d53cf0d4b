use dotbox_engine::{GameState, Player};
use dotbox_protocol::RoomCode;

use crate::{ClientError, ClientStatus, Feedback};

/// Something the application should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection status changed.
    Status(ClientStatus),
    /// The room admitted us.
    Joined {
        /// Our slot.
        player_index: Player,
        /// The room's code (freshly generated when created via `/new`).
        room: RoomCode,
    },
    /// A new authoritative state; replace any local copy.
    State(GameState),
    /// A cue inferred from the last state change.
    Feedback(Feedback),
    /// A rule-violation notice from the room ("Not your turn", ...).
    Notice(String),
    /// A user-facing failure.
    Error(ClientError),
}

//! Messages exchanged between a client and its room session.
//!
//! Both enums are internally tagged (`#[serde(tag = "type")]`) with
//! snake_case variant names, so a move looks like
//! `{"type":"move","r":3,"c":1,"isH":true}` on the wire. Field names are
//! camelCase, matching what browser peers already send.

use dotbox_engine::{GameState, Line, Player};
use serde::{Deserialize, Serialize};

use crate::RoomCode;

/// User-facing texts for rule violations reported via
/// [`ServerMessage::Error`].
pub mod notice {
    /// A move arrived while only one slot is occupied.
    pub const WAITING_FOR_OPPONENT: &str = "Waiting for opponent";
    /// The sender's slot doesn't match the current player.
    pub const NOT_YOUR_TURN: &str = "Not your turn";
    /// Coordinates missing, negative, or rejected by the engine.
    pub const INVALID_MOVE: &str = "Invalid move";
    /// The requested room code failed validation.
    pub const INVALID_ROOM: &str = "Invalid room code";
}

// ---------------------------------------------------------------------------
// Client → Session
// ---------------------------------------------------------------------------

/// Everything a client may send to its room session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Draw a line.
    ///
    /// Coordinates are optional and signed on purpose: a request with a
    /// missing or negative coordinate is still a well-formed message and is
    /// answered with an "invalid move" notice rather than dropped.
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        r: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        c: Option<i64>,
        #[serde(rename = "isH", default, skip_serializing_if = "Option::is_none")]
        is_h: Option<bool>,
    },

    /// Liveness answer to a [`ServerMessage::Ping`]. Carries nothing else.
    Pong,
}

impl ClientMessage {
    /// Builds a complete move request for `line`.
    pub fn play(line: Line) -> Self {
        Self::Move {
            r: Some(line.row as i64),
            c: Some(line.col as i64),
            is_h: Some(matches!(
                line.orientation,
                dotbox_engine::Orientation::Horizontal
            )),
        }
    }

    /// The requested line, if this is a move with all three fields present
    /// and non-negative coordinates.
    pub fn requested_line(&self) -> Option<Line> {
        match self {
            Self::Move {
                r: Some(r),
                c: Some(c),
                is_h: Some(is_h),
            } => {
                let row = usize::try_from(*r).ok()?;
                let col = usize::try_from(*c).ok()?;
                Some(Line::new(row, col, *is_h))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session → Client
// ---------------------------------------------------------------------------

/// Everything a room session may send to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to a newly admitted peer.
    #[serde(rename_all = "camelCase")]
    Joined {
        /// The slot this connection now holds.
        player_index: Player,
        /// Code of the room, so a peer that asked for a fresh room learns it.
        room_id: RoomCode,
        /// Authoritative state at admission time.
        game_state: GameState,
        /// `true` if the other slot was already occupied.
        ready: bool,
    },

    /// Sent to the waiting peer when its opponent arrives.
    #[serde(rename_all = "camelCase")]
    OpponentJoined {
        /// Fresh copy of the current state.
        game_state: GameState,
    },

    /// Broadcast to every peer after an accepted move.
    #[serde(rename_all = "camelCase")]
    State {
        /// The state after the move.
        game_state: GameState,
    },

    /// Sent to the surviving peer when the other one goes away.
    #[serde(rename_all = "camelCase")]
    OpponentDisconnected {
        /// Latest persisted state, so the survivor can reconcile.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_state: Option<GameState>,
    },

    /// The room already has two players; the socket will be closed.
    Full,

    /// A rule violation. Informational, never changes state.
    Error {
        /// Human-readable reason (see [`notice`]).
        message: String,
    },

    /// Liveness probe; answer with [`ClientMessage::Pong`].
    Ping,
}

impl ServerMessage {
    /// Shorthand for an [`ServerMessage::Error`] notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The game state carried by this message, if any.
    pub fn game_state(&self) -> Option<&GameState> {
        match self {
            Self::Joined { game_state, .. }
            | Self::OpponentJoined { game_state }
            | Self::State { game_state } => Some(game_state),
            Self::OpponentDisconnected { game_state } => game_state.as_ref(),
            Self::Full | Self::Error { .. } | Self::Ping => None,
        }
    }
}

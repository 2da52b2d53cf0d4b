//! Error types for the engine.

use crate::Line;

/// Reasons a move is rejected. A rejected move never changes the state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The game already has a winner (or ended in a draw).
    #[error("game is over")]
    GameOver,

    /// The line does not exist on this board for its orientation.
    #[error("line {0} is out of bounds")]
    OutOfBounds(Line),

    /// Somebody already drew this line.
    #[error("line {0} is already drawn")]
    AlreadyDrawn(Line),
}

/// Invalid board dimensions passed to [`GameState::new`](crate::GameState::new).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("board needs at least 2x2 dots, got {rows}x{cols}")]
pub struct BoardError {
    /// Requested dot rows.
    pub rows: usize,
    /// Requested dot columns.
    pub cols: usize,
}

//! What just happened on the board, inferred from two consecutive states.

use dotbox_engine::{GameState, Outcome};

/// A cue for the player (sound, animation) derived from a state update.
///
/// The server never says what happened; the client compares the previous
/// and new states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// A line was drawn without closing a box.
    LineDrawn,
    /// At least one box was closed.
    BoxCompleted,
    /// The match just ended.
    GameWon(Outcome),
}

impl Feedback {
    /// Compares `previous` with `next`. Returns `None` when nothing moved.
    pub fn infer(previous: Option<&GameState>, next: &GameState) -> Option<Self> {
        let was_decided = previous.is_some_and(|p| p.winner().is_decided());
        if next.winner().is_decided() && !was_decided {
            return Some(Self::GameWon(next.winner()));
        }
        let previous_boxes = previous.map_or(0, |p| p.scores().total());
        if next.scores().total() > previous_boxes {
            return Some(Self::BoxCompleted);
        }
        let previous_moves = previous.map_or(0, GameState::move_count);
        (next.move_count() > previous_moves).then_some(Self::LineDrawn)
    }
}

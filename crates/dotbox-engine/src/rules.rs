//! The single transition operation: [`apply_move`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GameState, MoveError};

/// Direction of a line between two adjacent dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Between dots `(r, c)` and `(r, c+1)`.
    Horizontal,
    /// Between dots `(r, c)` and `(r+1, c)`.
    Vertical,
}

/// One edge of the board, addressed by its top/left dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    /// Dot row.
    pub row: usize,
    /// Dot column.
    pub col: usize,
    /// Horizontal or vertical.
    pub orientation: Orientation,
}

impl Line {
    /// A horizontal line starting at dot `(row, col)`.
    pub fn horizontal(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            orientation: Orientation::Horizontal,
        }
    }

    /// A vertical line starting at dot `(row, col)`.
    pub fn vertical(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            orientation: Orientation::Vertical,
        }
    }

    /// Builds a line from the wire's `isH` flag.
    pub fn new(row: usize, col: usize, is_horizontal: bool) -> Self {
        if is_horizontal {
            Self::horizontal(row, col)
        } else {
            Self::vertical(row, col)
        }
    }

    /// Boxes that this line bounds on a `rows × cols` dot board (at most two).
    ///
    /// Horizontal `(r, c)`: the box above `(r-1, c)` and below `(r, c)`.
    /// Vertical `(r, c)`: the box left `(r, c-1)` and right `(r, c)`.
    fn adjacent_boxes(self, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
        let (r, c) = (self.row, self.col);
        let (before, after) = match self.orientation {
            Orientation::Horizontal => (
                r.checked_sub(1).map(|above| (above, c)),
                (r + 1 < rows).then_some((r, c)),
            ),
            Orientation::Vertical => (
                c.checked_sub(1).map(|left| (r, left)),
                (c + 1 < cols).then_some((r, c)),
            ),
        };
        before.into_iter().chain(after)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.orientation {
            Orientation::Horizontal => 'H',
            Orientation::Vertical => 'V',
        };
        write!(f, "{tag}({},{})", self.row, self.col)
    }
}

/// Applies one move for `state.current_player()` and returns the new state.
///
/// Checked in order before anything is touched:
/// 1. the game is not over
/// 2. the line exists on the board
/// 3. the line is not drawn yet
///
/// On success the line is drawn, every adjacent box whose fourth side this
/// was goes to the mover, the mover keeps the turn if at least one box was
/// completed (otherwise the turn passes), and `move_count` grows by one.
/// The input state is never modified.
pub fn apply_move(state: &GameState, line: Line) -> Result<GameState, MoveError> {
    if state.is_finished() {
        return Err(MoveError::GameOver);
    }
    if !state.contains(line) {
        return Err(MoveError::OutOfBounds(line));
    }
    if state.line_cell(line) != Some(0) {
        return Err(MoveError::AlreadyDrawn(line));
    }

    let mover = state.current_player();
    let mut next = state.clone();
    if !next.draw_line(line, mover) {
        return Err(MoveError::AlreadyDrawn(line));
    }

    let mut completed = 0;
    for (row, col) in line.adjacent_boxes(state.rows(), state.cols()) {
        if next.is_box_closed(row, col) && next.claim_box(row, col, mover) {
            completed += 1;
        }
    }

    next.finish_turn(mover, completed);
    Ok(next)
}

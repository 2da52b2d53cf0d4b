//! The game-state value.
//!
//! A [`GameState`] is never mutated in place by the rest of the workspace:
//! every accepted move produces a fresh value through
//! [`apply_move`](crate::apply_move). Fields are private so the invariants
//! below can only be broken by deserializing hostile input, and even then the
//! engine only reads cells through bounds-checked accessors.
//!
//! - a drawn line never changes owner and is never erased
//! - a box is owned only when its four sides are drawn
//! - `scores.one + scores.two` equals the number of owned boxes
//! - `winner` is decided only when every box is owned

use serde::{Deserialize, Serialize};

use crate::{BoardError, Line, Orientation, Outcome, Player};

/// Dots per side of the reference board.
pub const DEFAULT_DOTS: usize = 8;

/// Completed-box count per player.
///
/// Serialized as `{"1": n, "2": m}` so clients can index it by player number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "1")]
    one: u32,
    #[serde(rename = "2")]
    two: u32,
}

impl Scores {
    /// Score of one player.
    pub fn get(&self, player: Player) -> u32 {
        match player {
            Player::One => self.one,
            Player::Two => self.two,
        }
    }

    /// Sum of both scores.
    pub fn total(&self) -> u32 {
        self.one + self.two
    }

    pub(crate) fn add(&mut self, player: Player, boxes: u32) {
        match player {
            Player::One => self.one += boxes,
            Player::Two => self.two += boxes,
        }
    }
}

/// Complete state of one Dots & Boxes match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    rows: usize,
    cols: usize,
    /// `rows × (cols-1)`, `0` or the drawing player's number.
    h_lines: Vec<Vec<u8>>,
    /// `(rows-1) × cols`, same encoding.
    v_lines: Vec<Vec<u8>>,
    /// `(rows-1) × (cols-1)`, `0` or the owning player's number.
    boxes: Vec<Vec<u8>>,
    current_player: Player,
    scores: Scores,
    winner: Outcome,
    move_count: u64,
}

impl GameState {
    /// Creates an empty board with `rows × cols` dots.
    pub fn new(rows: usize, cols: usize) -> Result<Self, BoardError> {
        if rows < 2 || cols < 2 {
            return Err(BoardError { rows, cols });
        }
        Ok(Self::empty(rows, cols))
    }

    /// The reference 8×8-dot board.
    pub fn standard() -> Self {
        Self::empty(DEFAULT_DOTS, DEFAULT_DOTS)
    }

    /// Callers guarantee `rows >= 2 && cols >= 2`.
    fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            h_lines: vec![vec![0; cols - 1]; rows],
            v_lines: vec![vec![0; cols]; rows - 1],
            boxes: vec![vec![0; cols - 1]; rows - 1],
            current_player: Player::One,
            scores: Scores::default(),
            winner: Outcome::Undecided,
            move_count: 0,
        }
    }

    /// Dot rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Dot columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whose turn it is.
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    /// Completed boxes per player.
    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Final result, or [`Outcome::Undecided`] while boxes remain.
    pub fn winner(&self) -> Outcome {
        self.winner
    }

    /// Number of accepted moves so far.
    pub fn move_count(&self) -> u64 {
        self.move_count
    }

    /// Number of boxes on the board, `(rows-1) * (cols-1)`.
    pub fn total_boxes(&self) -> u32 {
        (self.rows.saturating_sub(1) * self.cols.saturating_sub(1)) as u32
    }

    /// Returns `true` once the winner (or draw) is decided.
    pub fn is_finished(&self) -> bool {
        self.winner.is_decided()
    }

    /// Returns `true` if the line exists on this board.
    pub fn contains(&self, line: Line) -> bool {
        match line.orientation {
            Orientation::Horizontal => {
                line.row < self.rows && line.col + 1 < self.cols
            }
            Orientation::Vertical => {
                line.row + 1 < self.rows && line.col < self.cols
            }
        }
    }

    /// Who drew `line`, or `None` if undrawn or off the board.
    pub fn line_owner(&self, line: Line) -> Option<Player> {
        self.line_cell(line).and_then(Player::from_number)
    }

    /// Who owns box `(row, col)`, or `None` if unclaimed or off the board.
    pub fn box_owner(&self, row: usize, col: usize) -> Option<Player> {
        self.boxes
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .and_then(Player::from_number)
    }

    /// Number of boxes with an owner.
    pub fn claimed_boxes(&self) -> u32 {
        self.boxes
            .iter()
            .flatten()
            .filter(|cell| **cell != 0)
            .count() as u32
    }

    /// Every line not yet drawn, horizontal lines first.
    pub fn available_lines(&self) -> Vec<Line> {
        let horizontal = self.h_lines.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| **cell == 0)
                .map(move |(c, _)| Line::horizontal(r, c))
        });
        let vertical = self.v_lines.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| **cell == 0)
                .map(move |(c, _)| Line::vertical(r, c))
        });
        horizontal.chain(vertical).collect()
    }

    // -- Engine internals -------------------------------------------------

    pub(crate) fn line_cell(&self, line: Line) -> Option<u8> {
        let grid = match line.orientation {
            Orientation::Horizontal => &self.h_lines,
            Orientation::Vertical => &self.v_lines,
        };
        grid.get(line.row).and_then(|r| r.get(line.col)).copied()
    }

    pub(crate) fn draw_line(&mut self, line: Line, player: Player) -> bool {
        let grid = match line.orientation {
            Orientation::Horizontal => &mut self.h_lines,
            Orientation::Vertical => &mut self.v_lines,
        };
        match grid.get_mut(line.row).and_then(|r| r.get_mut(line.col)) {
            Some(cell) if *cell == 0 => {
                *cell = player.number();
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if all four sides of box `(row, col)` are drawn.
    pub(crate) fn is_box_closed(&self, row: usize, col: usize) -> bool {
        let drawn = |line: Line| self.line_cell(line).is_some_and(|cell| cell != 0);
        drawn(Line::horizontal(row, col))
            && drawn(Line::horizontal(row + 1, col))
            && drawn(Line::vertical(row, col))
            && drawn(Line::vertical(row, col + 1))
    }

    /// Assigns an unowned box. Returns `false` if it was already owned.
    pub(crate) fn claim_box(&mut self, row: usize, col: usize, player: Player) -> bool {
        match self.boxes.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) if *cell == 0 => {
                *cell = player.number();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn finish_turn(&mut self, mover: Player, completed: u32) {
        self.scores.add(mover, completed);
        if self.scores.total() >= self.total_boxes() {
            let one = self.scores.get(Player::One);
            let two = self.scores.get(Player::Two);
            self.winner = match one.cmp(&two) {
                std::cmp::Ordering::Greater => Outcome::Won(Player::One),
                std::cmp::Ordering::Less => Outcome::Won(Player::Two),
                std::cmp::Ordering::Equal => Outcome::Draw,
            };
        }
        if completed == 0 {
            self.current_player = mover.opponent();
        }
        self.move_count += 1;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::standard()
    }
}

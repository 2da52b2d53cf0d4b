//! Dots & Boxes rules engine for Dotbox.
//!
//! The engine is a pure state-transition function: [`apply_move`] takes a
//! [`GameState`] and a [`Line`] and returns either a brand-new state or a
//! [`MoveError`]. There is no I/O, no clock and no randomness, so the same
//! input always produces the same output. The room layer relies on this to
//! replay and validate moves on the server.
//!
//! # Board geometry
//!
//! A board is described by its dot grid (`rows × cols` dots, 8×8 by
//! default):
//!
//! ```text
//!  hLines: rows × (cols-1)      vLines: (rows-1) × cols
//!  boxes:  (rows-1) × (cols-1)
//!
//!   •───•───•        box (r, c) is bounded by
//!   │   │   │          hLines[r][c]   (top)
//!   •───•───•          hLines[r+1][c] (bottom)
//!   │   │   │          vLines[r][c]   (left)
//!   •───•───•          vLines[r][c+1] (right)
//! ```

mod error;
mod player;
mod rules;
mod state;

pub use error::{BoardError, MoveError};
pub use player::{Outcome, Player};
pub use rules::{apply_move, Line, Orientation};
pub use state::{GameState, Scores, DEFAULT_DOTS};

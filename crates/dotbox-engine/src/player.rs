//! Player and outcome types.
//!
//! Both types travel on the wire as plain numbers so that browser clients can
//! index score maps and compare turns without any decoding step:
//!
//! - [`Player`]: `1` or `2`
//! - [`Outcome`]: `0` (undecided), `1`/`2` (winner) or `-1` (draw)

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two player slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    /// Player 1 always moves first.
    One,
    /// Player 2.
    Two,
}

impl Player {
    /// Returns the other player.
    pub fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// The wire number of this player (`1` or `2`).
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Parses a wire number. Anything but `1` or `2` is `None`.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        player.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("invalid player number {n}"))
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.number())
    }
}

/// How the game ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Outcome {
    /// Boxes remain to be claimed.
    #[default]
    Undecided,
    /// All boxes claimed and this player holds more of them.
    Won(Player),
    /// All boxes claimed, equal scores.
    Draw,
}

impl Outcome {
    /// Wire marker for a draw.
    pub const DRAW_MARKER: i8 = -1;

    /// Returns `true` once the game has ended either way.
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

impl From<Outcome> for i8 {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Undecided => 0,
            Outcome::Won(player) => player.number() as i8,
            Outcome::Draw => Outcome::DRAW_MARKER,
        }
    }
}

impl TryFrom<i8> for Outcome {
    type Error = String;

    fn try_from(n: i8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(Self::Undecided),
            1 => Ok(Self::Won(Player::One)),
            2 => Ok(Self::Won(Player::Two)),
            Self::DRAW_MARKER => Ok(Self::Draw),
            other => Err(format!("invalid winner marker {other}")),
        }
    }
}

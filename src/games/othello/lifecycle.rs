//! Termination detection and winner computation.

use super::rules::has_any_legal_move;
use super::{Board, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Final result of a game, from the collective's point of view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Winner {
    /// The AI side has more disks.
    Ai,
    /// The collective side has more disks.
    Collective,
    /// Equal disk counts.
    Draw,
}

/// Disk counts per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    /// Black disks.
    pub black: usize,
    /// White disks.
    pub white: usize,
}

impl Score {
    /// Counts the disks on `board`.
    pub fn of(board: &Board) -> Self {
        Self {
            black: board.count(Side::Black),
            white: board.count(Side::White),
        }
    }

    /// Disks held by `side`.
    pub fn for_side(&self, side: Side) -> usize {
        match side {
            Side::Black => self.black,
            Side::White => self.white,
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Black {} - White {}", self.black, self.white)
    }
}

/// Checks if the game is over.
///
/// True when the board is full or neither side has a legal move. A single
/// blocked side only forfeits its turn.
#[instrument(skip(board))]
pub fn is_game_over(board: &Board) -> bool {
    if board.is_full() {
        debug!("Board is full");
        return true;
    }
    let over = !has_any_legal_move(board, Side::Black) && !has_any_legal_move(board, Side::White);
    if over {
        debug!("Neither side can move");
    }
    over
}

/// Decides the winner of a final board given which side the AI played.
#[instrument(skip(board))]
pub fn determine_winner(board: &Board, ai_side: Side) -> Winner {
    let score = Score::of(board);
    let ai = score.for_side(ai_side);
    let collective = score.for_side(ai_side.opponent());

    let winner = match ai.cmp(&collective) {
        std::cmp::Ordering::Greater => Winner::Ai,
        std::cmp::Ordering::Less => Winner::Collective,
        std::cmp::Ordering::Equal => Winner::Draw,
    };
    debug!(ai, collective, %winner, "Winner determined");
    winner
}

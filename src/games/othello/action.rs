//! First-class move and move-error types.

use super::{Board, Position, Side};
use serde::Serialize;
use tracing::instrument;

/// A disk placement by one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Move {
    /// The side placing the disk.
    pub side: Side,
    /// Where the disk goes.
    pub position: Position,
}

impl Move {
    /// Creates a new move.
    #[instrument]
    pub fn new(side: Side, position: Position) -> Self {
        Self { side, position }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.side, self.position)
    }
}

/// The board produced by an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Board after the placement and all flips.
    pub board: Board,
    /// Disks that changed colour, in scan order.
    pub flipped: Vec<Position>,
}

impl MoveOutcome {
    /// Number of flipped disks.
    pub fn flipped_count(&self) -> usize {
        self.flipped.len()
    }
}

/// Reason a move was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum MoveError {
    /// The target cell already holds a disk.
    #[display("Cell {_0} is already occupied")]
    Occupied(#[error(not(source))] Position),

    /// The placement would not capture any disk.
    #[display("Move at {_0} does not flip any disk")]
    NoFlips(#[error(not(source))] Position),

    /// A post-move check failed.
    #[display("Invariant violation: {_0}")]
    InvariantViolation(#[error(not(source))] String),
}

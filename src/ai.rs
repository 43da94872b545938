//! AI move selection seam.
//!
//! The engine treats move selection as a black box: it hands a selector
//! the board and the legal moves and validates whatever comes back.

use crate::games::othello::{Board, Position, Side, flips_for};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Chooses a move for the AI side.
pub trait MoveSelector: Send + Sync {
    /// Picks one of `legal`. Returning `None` or a position outside
    /// `legal` is treated as a selector failure.
    fn select_move(&self, board: &Board, side: Side, legal: &[Position]) -> Option<Position>;

    /// Returns the selector's display name.
    fn name(&self) -> &str;
}

/// Picks the first legal move in row-major order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstLegal;

impl MoveSelector for FirstLegal {
    #[instrument(skip(self, _board))]
    fn select_move(&self, _board: &Board, _side: Side, legal: &[Position]) -> Option<Position> {
        legal.first().copied()
    }

    fn name(&self) -> &str {
        "first_legal"
    }
}

/// Picks the move that flips the most disks; earliest in row-major order on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostFlips;

impl MoveSelector for MostFlips {
    #[instrument(skip(self, board))]
    fn select_move(&self, board: &Board, side: Side, legal: &[Position]) -> Option<Position> {
        let mut best: Option<(Position, usize)> = None;
        for pos in legal {
            let flips = flips_for(board, side, *pos).len();
            if best.is_none_or(|(_, most)| flips > most) {
                best = Some((*pos, flips));
            }
        }
        if let Some((pos, flips)) = best {
            debug!(position = %pos, flips, "Greedy choice");
        }
        best.map(|(pos, _)| pos)
    }

    fn name(&self) -> &str {
        "most_flips"
    }
}

/// Selector chosen through configuration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AiStrategy {
    /// [`FirstLegal`].
    FirstLegal,
    /// [`MostFlips`].
    #[default]
    MostFlips,
}

impl AiStrategy {
    /// Builds the selector for this strategy.
    #[instrument]
    pub fn selector(self) -> Arc<dyn MoveSelector> {
        match self {
            AiStrategy::FirstLegal => Arc::new(FirstLegal),
            AiStrategy::MostFlips => Arc::new(MostFlips),
        }
    }
}

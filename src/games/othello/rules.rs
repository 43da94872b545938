//! Move legality and flip application.

use super::action::{Move, MoveError, MoveOutcome};
use super::contracts::{Contract, MoveContract};
use super::{Board, Cell, Direction, Position, Side};
use std::collections::BTreeSet;
use tracing::{instrument, trace};

/// Disks that `side` would flip by placing at `pos`.
///
/// Empty when the cell is occupied or no direction brackets an opposing run.
#[instrument(skip(board))]
pub fn flips_for(board: &Board, side: Side, pos: Position) -> Vec<Position> {
    if board.get(pos) != Cell::Empty {
        return Vec::new();
    }
    Direction::all()
        .flat_map(|direction| bracketed_run(board, side, pos, direction))
        .collect()
}

/// The contiguous opposing run starting next to `from`, if a disk of `side` closes it.
fn bracketed_run(board: &Board, side: Side, from: Position, direction: Direction) -> Vec<Position> {
    let mut run = Vec::new();
    let mut cursor = from.step(direction);

    while let Some(pos) = cursor {
        match board.get(pos) {
            Cell::Occupied(owner) if owner == side.opponent() => run.push(pos),
            Cell::Occupied(_) => return run,
            Cell::Empty => return Vec::new(),
        }
        cursor = pos.step(direction);
    }

    // Ran off the edge without closing the run.
    Vec::new()
}

/// Checks whether placing at `pos` is legal for `side`.
#[instrument(skip(board))]
pub fn is_legal(board: &Board, side: Side, pos: Position) -> bool {
    board.get(pos) == Cell::Empty
        && Direction::all().any(|direction| !bracketed_run(board, side, pos, direction).is_empty())
}

/// All legal placements for `side`.
#[instrument(skip(board))]
pub fn legal_moves(board: &Board, side: Side) -> BTreeSet<Position> {
    let moves: BTreeSet<_> = Position::all()
        .filter(|pos| is_legal(board, side, *pos))
        .collect();
    trace!(count = moves.len(), "Computed legal moves");
    moves
}

/// Checks if `side` has at least one legal placement.
#[instrument(skip(board))]
pub fn has_any_legal_move(board: &Board, side: Side) -> bool {
    Position::all().any(|pos| is_legal(board, side, pos))
}

/// Places a disk for `side` at `position` and flips every bracketed run.
///
/// The input board is not modified.
///
/// # Errors
///
/// Returns [`MoveError::Occupied`] or [`MoveError::NoFlips`] for an illegal
/// placement. In debug builds, also checks the disk-conservation contract.
#[instrument(skip(board))]
pub fn apply_move(board: &Board, side: Side, position: Position) -> Result<MoveOutcome, MoveError> {
    let action = Move::new(side, position);
    MoveContract::pre(board, &action)?;

    let flipped = flips_for(board, side, position);
    let mut next = board.with(position, Cell::Occupied(side));
    for pos in &flipped {
        next.set(*pos, Cell::Occupied(side));
    }

    #[cfg(debug_assertions)]
    MoveContract::post(board, &next, &action)?;

    trace!(flipped = flipped.len(), "Move applied");
    Ok(MoveOutcome {
        board: next,
        flipped,
    })
}

//! Contract-based validation for Othello moves.
//!
//! Contracts define correctness through preconditions and postconditions:
//! {P(board, move)} apply {Q(before, after, move)}

use super::action::{Move, MoveError};
use super::rules::is_legal;
use super::{Board, Cell};
use tracing::{instrument, warn};

/// A contract defines preconditions and postconditions for state transitions.
pub trait Contract<S, A> {
    /// Checks preconditions before applying the action.
    fn pre(state: &S, action: &A) -> Result<(), MoveError>;

    /// Checks postconditions after applying the action.
    fn post(before: &S, after: &S, action: &A) -> Result<(), MoveError>;
}

/// A property that must hold across a single applied move.
pub trait TransitionInvariant {
    /// Checks if the invariant holds for the transition.
    fn holds(before: &Board, after: &Board, action: &Move) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Precondition: the target cell must be empty.
pub struct CellIsEmpty;

impl CellIsEmpty {
    /// Checks the precondition.
    #[instrument(skip(board))]
    pub fn check(action: &Move, board: &Board) -> Result<(), MoveError> {
        if board.get(action.position) != Cell::Empty {
            Err(MoveError::Occupied(action.position))
        } else {
            Ok(())
        }
    }
}

/// Precondition: the placement must capture at least one disk.
pub struct CapturesDisks;

impl CapturesDisks {
    /// Checks the precondition.
    #[instrument(skip(board))]
    pub fn check(action: &Move, board: &Board) -> Result<(), MoveError> {
        if is_legal(board, action.side, action.position) {
            Ok(())
        } else {
            Err(MoveError::NoFlips(action.position))
        }
    }
}

/// Invariant: the mover gains exactly one more disk than the opponent loses,
/// and the opponent loses at least one.
pub struct DiskConservation;

impl TransitionInvariant for DiskConservation {
    fn holds(before: &Board, after: &Board, action: &Move) -> bool {
        let mover_before = before.count(action.side);
        let mover_after = after.count(action.side);
        let opp_before = before.count(action.side.opponent());
        let opp_after = after.count(action.side.opponent());

        let Some(gained) = mover_after.checked_sub(mover_before) else {
            return false;
        };
        let Some(lost) = opp_before.checked_sub(opp_after) else {
            return false;
        };
        lost >= 1 && gained == lost + 1
    }

    fn description() -> &'static str {
        "Mover gains flipped + 1 disks and opponent loses flipped (>= 1)"
    }
}

/// Invariant: exactly one empty cell is filled, and it is the target cell.
pub struct SinglePlacement;

impl TransitionInvariant for SinglePlacement {
    fn holds(before: &Board, after: &Board, action: &Move) -> bool {
        after.get(action.position) == Cell::Occupied(action.side)
            && before.empty_count() == after.empty_count() + 1
    }

    fn description() -> &'static str {
        "Exactly the target cell goes from empty to the mover's colour"
    }
}

/// Contract for disk placements.
///
/// Preconditions:
/// - Target cell is empty
/// - At least one opposing run is bracketed
///
/// Postconditions:
/// - Disk conservation
/// - Single placement
pub struct MoveContract;

impl Contract<Board, Move> for MoveContract {
    fn pre(board: &Board, action: &Move) -> Result<(), MoveError> {
        CellIsEmpty::check(action, board)?;
        CapturesDisks::check(action, board)?;
        Ok(())
    }

    fn post(before: &Board, after: &Board, action: &Move) -> Result<(), MoveError> {
        let mut violations = Vec::new();
        if !DiskConservation::holds(before, after, action) {
            violations.push(DiskConservation::description());
        }
        if !SinglePlacement::holds(before, after, action) {
            violations.push(SinglePlacement::description());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            warn!(%action, ?violations, "Move postcondition failed");
            Err(MoveError::InvariantViolation(format!(
                "Postcondition failed: {}",
                violations.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::othello::{Position, Side, apply_move};

    #[test]
    fn test_precondition_occupied_cell() {
        let action = Move::new(Side::Black, Position::new(3, 3).unwrap());
        assert!(matches!(
            MoveContract::pre(&Board::initial(), &action),
            Err(MoveError::Occupied(_))
        ));
    }

    #[test]
    fn test_precondition_no_capture() {
        let action = Move::new(Side::Black, Position::new(0, 0).unwrap());
        assert!(matches!(
            MoveContract::pre(&Board::initial(), &action),
            Err(MoveError::NoFlips(_))
        ));
    }

    #[test]
    fn test_postcondition_holds_after_move() {
        let before = Board::initial();
        let action = Move::new(Side::Black, Position::new(2, 3).unwrap());
        let outcome = apply_move(&before, action.side, action.position).unwrap();
        assert!(MoveContract::post(&before, &outcome.board, &action).is_ok());
    }

    #[test]
    fn test_postcondition_detects_corruption() {
        let before = Board::initial();
        let action = Move::new(Side::Black, Position::new(2, 3).unwrap());
        let outcome = apply_move(&before, action.side, action.position).unwrap();

        // An extra black disk that no capture accounts for.
        let corrupted = outcome
            .board
            .with(Position::new(7, 7).unwrap(), Cell::Occupied(Side::Black));
        assert!(MoveContract::post(&before, &corrupted, &action).is_err());
    }
}

mod action;
mod contracts;
mod lifecycle;
mod position;
mod rules;
mod types;

pub use action::{Move, MoveError, MoveOutcome};
pub use contracts::{
    CapturesDisks, CellIsEmpty, Contract, DiskConservation, MoveContract, SinglePlacement,
    TransitionInvariant,
};
pub use lifecycle::{Score, Winner, determine_winner, is_game_over};
pub use position::{BOARD_SIZE, Direction, Position, PositionParseError};
pub use rules::{apply_move, flips_for, has_any_legal_move, is_legal, legal_moves};
pub use types::{Board, BoardParseError, Cell, Side};

//! Engine error taxonomy.

use derive_more::{Display, Error, From};

use crate::games::othello::{MoveError, Position};
use crate::store::StoreError;

/// Error returned by engine operations.
///
/// Every variant except [`EngineError::Store`] is a local rejection: nothing
/// was written and the caller may act on the fresh game state.
#[derive(Debug, Clone, Display, Error, From)]
pub enum EngineError {
    /// The position is occupied or flips nothing for the side to move.
    #[display("Illegal move at {position}: {reason}")]
    IllegalMove {
        /// Rejected position.
        position: Position,
        /// Why the move is illegal.
        #[error(source)]
        reason: MoveError,
    },

    /// The request names a turn or side that is not current.
    #[display("Not your turn in game {game_id}: requested turn {requested_turn}, current turn {current_turn}")]
    NotYourTurn {
        /// Game addressed.
        game_id: String,
        /// Turn the caller asked for.
        requested_turn: u32,
        /// Turn the game is on.
        current_turn: u32,
    },

    /// No candidate with this id exists for the current turn.
    #[display("Candidate {candidate_id} not found")]
    CandidateNotFound {
        /// Unknown candidate id.
        candidate_id: String,
    },

    /// The voter already voted this turn.
    #[display("Voter {voter_id} already voted on turn {turn_number}")]
    DuplicateVote {
        /// Voter id.
        voter_id: String,
        /// Turn voted on.
        turn_number: u32,
    },

    /// The game has finished and accepts no further changes.
    #[display("Game {game_id} is already finished")]
    GameAlreadyFinished {
        /// Game addressed.
        game_id: String,
    },

    /// No game with this id exists.
    #[display("Game {game_id} not found")]
    GameNotFound {
        /// Game addressed.
        game_id: String,
    },

    /// The move selector returned nothing or a position outside the legal set.
    #[display("Selector {selector} returned an invalid move: {position:?}")]
    InvalidAiMove {
        /// Name of the selector.
        selector: String,
        /// What it returned.
        position: Option<Position>,
    },

    /// Persistence failure; the operation applied nothing.
    #[display("{_0}")]
    #[from]
    Store(StoreError),
}

impl EngineError {
    /// Checks if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(err) if err.retryable)
    }
}

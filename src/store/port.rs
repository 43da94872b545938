//! Storage port used by the engine.
//!
//! Every mutating method is a single conditional write: it checks the
//! game's current turn inside the same atomic step that applies the change,
//! so concurrent callers can never half-apply a vote or a turn advance.

use super::error::StoreError;
use super::models::{Candidate, Game, GameStatus};
use super::pagination::{Page, PageRequest};
use crate::games::othello::{Board, Winner};

/// Why a conditional write did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// No game with that id.
    GameNotFound,
    /// The game has finished.
    GameFinished,
    /// The game is on a different turn.
    StaleTurn {
        /// The game's actual turn number.
        current: u32,
    },
    /// No candidate with that id for the given game and turn.
    UnknownCandidate,
    /// The voter already voted this turn.
    DuplicateVote,
}

/// Result of [`GameStore::insert_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// Stored as a new candidate with its assigned sequence.
    Inserted(Candidate),
    /// A candidate for the same position already exists this turn.
    Existing(Candidate),
    /// Nothing was written.
    Rejected(Conflict),
}

/// Result of [`GameStore::record_vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was recorded and the candidate now has `vote_count` votes.
    Counted {
        /// Candidate's vote count after this vote.
        vote_count: u32,
    },
    /// Nothing was written.
    Rejected(Conflict),
}

/// Result of [`GameStore::advance_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The game moved to the next turn; carries the new state.
    Advanced(Game),
    /// Nothing was written.
    Rejected(Conflict),
}

/// Result of [`GameStore::resolve_collective_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The turn was closed. `applied` is the candidate that won, or `None`
    /// when there were no candidates and the collective forfeited.
    Resolved {
        /// Game state after the turn.
        game: Game,
        /// The winning candidate as tallied at the moment of the write.
        applied: Option<Candidate>,
    },
    /// Nothing was written.
    Rejected(Conflict),
}

/// Persistence operations for games, candidates and votes.
pub trait GameStore: Send + Sync {
    /// Stores a newly created game.
    fn insert_game(&self, game: &Game) -> Result<(), StoreError>;

    /// Loads a game by id.
    fn load_game(&self, game_id: &str) -> Result<Option<Game>, StoreError>;

    /// Lists games newest first, optionally filtered by status.
    fn list_games(
        &self,
        status: Option<GameStatus>,
        request: &PageRequest,
    ) -> Result<Page<Game>, StoreError>;

    /// Stores a candidate if its game is active and still on the
    /// candidate's turn. One candidate per `(game, turn, position)`.
    fn insert_candidate(&self, candidate: Candidate) -> Result<ProposeOutcome, StoreError>;

    /// Candidates for one turn in proposal order.
    fn load_candidates(&self, game_id: &str, turn_number: u32)
    -> Result<Vec<Candidate>, StoreError>;

    /// Records that `voter_id` voted for `candidate_id` and increments its
    /// count, as one atomic step. At most one vote per voter per turn.
    fn record_vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteOutcome, StoreError>;

    /// Replaces the board and increments the turn number, only if the game
    /// is still on `expected_turn`. A `Some` winner finishes the game in the
    /// same write.
    fn advance_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
        board: Board,
        winner: Option<Winner>,
    ) -> Result<AdvanceOutcome, StoreError>;

    /// Closes the collective turn `expected_turn`: reads the tally, picks the
    /// leading candidate and advances the game, all in the same atomic step
    /// that [`GameStore::record_vote`] writes under. Every vote is either in
    /// the tally that picked the winner or rejected as stale.
    fn resolve_collective_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
    ) -> Result<ResolveOutcome, StoreError>;
}

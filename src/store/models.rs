//! Persisted game and candidate records.

use chrono::{DateTime, SubsecRound, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::games::othello::{
    Board, MoveOutcome, Position, Side, Winner, determine_winner, is_game_over,
};

/// Unique identifier for a game.
pub type GameId = String;

/// Unique identifier for a candidate move.
pub type CandidateId = String;

/// Identifier of an anonymous collective participant.
pub type ParticipantId = String;

/// Current time truncated to microseconds, the precision every store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Lifecycle status of a game.
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
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GameStatus {
    /// Moves are still being played.
    Active,
    /// The game has ended and has a winner.
    Finished,
}

/// Turn state machine phase.
///
/// `Resolving` is transient: it exists only while a resolution is being
/// computed and is never observed on a stored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// The AI side is to move.
    AwaitingAiMove,
    /// The collective is proposing and voting.
    AwaitingVotes,
    /// A collective turn is being resolved.
    Resolving,
    /// No further moves are accepted.
    Finished,
}

/// A game between the AI and the collective.
///
/// `winner` is `Some` exactly when `status` is [`GameStatus::Finished`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct Game {
    id: GameId,
    status: GameStatus,
    ai_side: Side,
    turn_number: u32,
    board: Board,
    winner: Option<Winner>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Game {
    /// Creates a new active game at turn 0 with the opening board.
    #[instrument]
    pub fn new(ai_side: Side) -> Self {
        let created_at = now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: GameStatus::Active,
            ai_side,
            turn_number: 0,
            board: Board::initial(),
            winner: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rebuilds a game from stored fields, rejecting records that break the
    /// status/winner invariant.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: GameId,
        status: GameStatus,
        ai_side: Side,
        turn_number: u32,
        board: Board,
        winner: Option<Winner>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Option<Self> {
        let consistent = (status == GameStatus::Finished) == winner.is_some();
        consistent.then_some(Self {
            id,
            status,
            ai_side,
            turn_number,
            board,
            winner,
            created_at,
            updated_at,
        })
    }

    /// The state after one turn: next turn number, new board, and the
    /// winner if this turn ended the game.
    pub(crate) fn advanced(&self, board: Board, winner: Option<Winner>) -> Self {
        Self {
            id: self.id.clone(),
            status: if winner.is_some() {
                GameStatus::Finished
            } else {
                GameStatus::Active
            },
            ai_side: self.ai_side,
            turn_number: self.turn_number + 1,
            board,
            winner,
            created_at: self.created_at,
            updated_at: now(),
        }
    }

    /// Winner recorded if `board` ends the game, judged against this game's
    /// AI side.
    pub(crate) fn winner_after(&self, board: &Board) -> Option<Winner> {
        is_game_over(board).then(|| determine_winner(board, self.ai_side))
    }

    /// Side the collective plays.
    pub fn collective_side(&self) -> Side {
        self.ai_side.opponent()
    }

    /// Side whose turn it is. Black moves on even turns.
    pub fn side_to_move(&self) -> Side {
        if self.turn_number % 2 == 0 {
            Side::Black
        } else {
            Side::White
        }
    }

    /// Checks if the game has ended.
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Current phase of the turn state machine.
    pub fn phase(&self) -> TurnPhase {
        if self.is_finished() {
            TurnPhase::Finished
        } else if self.side_to_move() == self.ai_side {
            TurnPhase::AwaitingAiMove
        } else {
            TurnPhase::AwaitingVotes
        }
    }
}

/// A proposed move for one collective turn.
///
/// The resulting board is computed once at proposal time so resolution is
/// a lookup. `sequence` orders proposals within a turn, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct Candidate {
    id: CandidateId,
    game_id: GameId,
    turn_number: u32,
    position: Position,
    proposer_id: ParticipantId,
    vote_count: u32,
    flipped_count: u32,
    resulting_board: Board,
    sequence: u64,
    created_at: DateTime<Utc>,
}

impl Candidate {
    /// Creates an unsaved candidate with no votes.
    #[instrument(skip(outcome), fields(flipped = outcome.flipped_count()))]
    pub fn new(
        game_id: GameId,
        turn_number: u32,
        position: Position,
        proposer_id: ParticipantId,
        outcome: MoveOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            game_id,
            turn_number,
            position,
            proposer_id,
            vote_count: 0,
            flipped_count: outcome.flipped_count() as u32,
            resulting_board: outcome.board,
            sequence: 0,
            created_at: now(),
        }
    }

    /// Rebuilds a candidate from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: CandidateId,
        game_id: GameId,
        turn_number: u32,
        position: Position,
        proposer_id: ParticipantId,
        vote_count: u32,
        flipped_count: u32,
        resulting_board: Board,
        sequence: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            game_id,
            turn_number,
            position,
            proposer_id,
            vote_count,
            flipped_count,
            resulting_board,
            sequence,
            created_at,
        }
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub(crate) fn record_vote(&mut self) -> u32 {
        self.vote_count += 1;
        self.vote_count
    }
}

/// Picks the winning candidate: most votes, then earliest proposal.
///
/// The result depends only on vote counts and proposal order, never on the
/// order votes arrived in.
pub fn leading(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().max_by(|a, b| {
        a.vote_count
            .cmp(&b.vote_count)
            .then_with(|| b.sequence.cmp(&a.sequence))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_game_is_active_at_turn_zero() {
        let game = Game::new(Side::White);
        assert_eq!(*game.turn_number(), 0);
        assert_eq!(*game.status(), GameStatus::Active);
        assert!(game.winner().is_none());
        assert_eq!(*game.board(), Board::initial());
    }

    #[test]
    fn test_phase_follows_turn_parity() {
        let ai_black = Game::new(Side::Black);
        assert_eq!(ai_black.phase(), TurnPhase::AwaitingAiMove);

        let ai_white = Game::new(Side::White);
        assert_eq!(ai_white.phase(), TurnPhase::AwaitingVotes);

        let next = ai_white.advanced(Board::initial(), None);
        assert_eq!(next.phase(), TurnPhase::AwaitingAiMove);
        assert_eq!(*next.turn_number(), 1);
    }

    #[test]
    fn test_restore_rejects_inconsistent_winner() {
        let game = Game::new(Side::Black);
        let restored = Game::restore(
            game.id().clone(),
            GameStatus::Active,
            Side::Black,
            0,
            Board::initial(),
            Some(Winner::Ai),
            *game.created_at(),
            *game.updated_at(),
        );
        assert!(restored.is_none());
    }
}

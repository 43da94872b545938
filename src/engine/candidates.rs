//! Candidate proposal and voting for collective turns.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::error::EngineError;
use super::guards::{not_your_turn, require_game, require_turn, turn_rejection};
use crate::games::othello::{Position, apply_move};
use crate::store::{Candidate, Conflict, GameStore, ProposeOutcome, TurnPhase, VoteOutcome, leading};

/// Proposes candidate moves and counts votes on them.
#[derive(Clone)]
pub struct CandidateStore {
    store: Arc<dyn GameStore>,
}

impl std::fmt::Debug for CandidateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateStore").finish_non_exhaustive()
    }
}

impl CandidateStore {
    /// Creates a candidate store over `store`.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Proposes `position` for the collective on `turn_number`.
    ///
    /// The resulting board is computed here and stored with the candidate.
    /// Proposing a position that already has a candidate this turn returns
    /// that candidate unchanged.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotYourTurn`] if `turn_number` is not current or the
    ///   AI is to move
    /// - [`EngineError::IllegalMove`] if the collective cannot play `position`
    /// - [`EngineError::GameAlreadyFinished`] / [`EngineError::GameNotFound`]
    #[instrument(skip(self))]
    pub fn propose(
        &self,
        game_id: &str,
        turn_number: u32,
        proposer_id: &str,
        position: Position,
    ) -> Result<Candidate, EngineError> {
        let game = require_game(self.store.as_ref(), game_id)?;
        require_turn(&game, turn_number)?;
        if game.phase() != TurnPhase::AwaitingVotes {
            warn!(phase = %game.phase(), "Proposal outside a collective turn");
            return Err(not_your_turn(&game, turn_number));
        }

        let outcome = apply_move(game.board(), game.collective_side(), position).map_err(|reason| {
            warn!(%position, %reason, "Illegal proposal");
            EngineError::IllegalMove { position, reason }
        })?;

        let candidate = Candidate::new(
            game_id.to_string(),
            turn_number,
            position,
            proposer_id.to_string(),
            outcome,
        );

        match self.store.insert_candidate(candidate)? {
            ProposeOutcome::Inserted(candidate) => {
                info!(
                    candidate_id = %candidate.id(),
                    sequence = candidate.sequence(),
                    flipped = candidate.flipped_count(),
                    "Candidate proposed"
                );
                Ok(candidate)
            }
            ProposeOutcome::Existing(candidate) => {
                debug!(candidate_id = %candidate.id(), "Position already proposed");
                Ok(candidate)
            }
            ProposeOutcome::Rejected(conflict) => Err(turn_rejection(conflict, game_id, turn_number)),
        }
    }

    /// Casts `voter_id`'s vote for `candidate_id` and returns the
    /// candidate's new vote count.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DuplicateVote`] if the voter already voted this turn;
    ///   no count changes
    /// - [`EngineError::CandidateNotFound`] if the candidate is not one of
    ///   this turn's
    /// - [`EngineError::NotYourTurn`] if `turn_number` is not current or the
    ///   AI is to move
    /// - [`EngineError::GameAlreadyFinished`] / [`EngineError::GameNotFound`]
    #[instrument(skip(self))]
    pub fn vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<u32, EngineError> {
        let game = require_game(self.store.as_ref(), game_id)?;
        require_turn(&game, turn_number)?;
        if game.phase() != TurnPhase::AwaitingVotes {
            warn!(phase = %game.phase(), "Vote outside a collective turn");
            return Err(not_your_turn(&game, turn_number));
        }

        match self
            .store
            .record_vote(game_id, turn_number, voter_id, candidate_id)?
        {
            VoteOutcome::Counted { vote_count } => {
                info!(vote_count, "Vote counted");
                Ok(vote_count)
            }
            VoteOutcome::Rejected(Conflict::DuplicateVote) => {
                warn!("Duplicate vote rejected");
                Err(EngineError::DuplicateVote {
                    voter_id: voter_id.to_string(),
                    turn_number,
                })
            }
            VoteOutcome::Rejected(Conflict::UnknownCandidate) => {
                warn!("Vote for unknown candidate");
                Err(EngineError::CandidateNotFound {
                    candidate_id: candidate_id.to_string(),
                })
            }
            VoteOutcome::Rejected(conflict) => Err(turn_rejection(conflict, game_id, turn_number)),
        }
    }

    /// Candidates proposed for one turn, in proposal order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on persistence failure.
    #[instrument(skip(self))]
    pub fn candidates(&self, game_id: &str, turn_number: u32) -> Result<Vec<Candidate>, EngineError> {
        let candidates = self.store.load_candidates(game_id, turn_number)?;
        debug!(count = candidates.len(), "Candidates loaded");
        Ok(candidates)
    }

    /// The candidate that would win if the turn resolved now: most votes,
    /// earliest proposal on ties.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on persistence failure.
    #[instrument(skip(self))]
    pub fn leading_candidate(
        &self,
        game_id: &str,
        turn_number: u32,
    ) -> Result<Option<Candidate>, EngineError> {
        let candidates = self.candidates(game_id, turn_number)?;
        Ok(leading(&candidates).cloned())
    }
}

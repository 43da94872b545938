//! Turn state machine.
//!
//! ```text
//! AwaitingAiMove --play_ai_turn--> AwaitingVotes --resolve_turn--> Resolving
//!       ^                                                              |
//!       +----------------------- not over ----------------------------+
//!                                                                      |
//!                                   Finished <-------- over -----------+
//! ```
//!
//! Every transition ends in one conditional write keyed on the turn being
//! resolved. AI turns use [`GameStore::advance_turn`]. Collective turns use
//! [`GameStore::resolve_collective_turn`], which tallies the votes inside the
//! same atomic step, so a vote either counts toward the applied move or is
//! rejected as stale. When two resolutions race, exactly one write lands and
//! the other reports [`TurnKind::AlreadyResolved`].

use derive_getters::Getters;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::error::EngineError;
use super::guards::{not_your_turn, require_game, turn_rejection};
use crate::ai::MoveSelector;
use crate::games::othello::{Board, Position, Winner, apply_move, legal_moves};
use crate::store::{AdvanceOutcome, Conflict, Game, GameStore, ResolveOutcome, TurnPhase};

/// What a resolved turn did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnKind {
    /// A move was placed.
    Applied {
        /// Where the disk went.
        position: Position,
        /// Disks flipped by it.
        flipped: u32,
    },
    /// The side to move had no move to play; the board is unchanged.
    Forfeit,
    /// Another caller already resolved this turn; nothing was written.
    AlreadyResolved,
}

/// Result of resolving one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct TurnResolution {
    /// The turn that was resolved.
    turn_number: u32,
    /// What happened on it.
    kind: TurnKind,
    /// Game state after resolution.
    game: Game,
}

impl TurnResolution {
    /// Phase the game is now in.
    pub fn phase(&self) -> TurnPhase {
        self.game.phase()
    }

    /// Winner, once the game has finished.
    pub fn winner(&self) -> Option<Winner> {
        *self.game.winner()
    }
}

/// Drives games through AI turns and collective resolutions.
#[derive(Clone)]
pub struct TurnCoordinator {
    store: Arc<dyn GameStore>,
    selector: Arc<dyn MoveSelector>,
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("selector", &self.selector.name())
            .finish_non_exhaustive()
    }
}

impl TurnCoordinator {
    /// Creates a coordinator that asks `selector` for AI moves.
    pub fn new(store: Arc<dyn GameStore>, selector: Arc<dyn MoveSelector>) -> Self {
        Self { store, selector }
    }

    /// Current phase of a game.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameNotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub fn phase(&self, game_id: &str) -> Result<TurnPhase, EngineError> {
        Ok(require_game(self.store.as_ref(), game_id)?.phase())
    }

    /// Plays the AI's move for the current turn.
    ///
    /// With no legal move the AI forfeits and the turn passes to the
    /// collective with the board unchanged.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotYourTurn`] if the collective is to move
    /// - [`EngineError::InvalidAiMove`] if the selector picks nothing or an
    ///   illegal position; nothing is applied
    /// - [`EngineError::GameAlreadyFinished`] / [`EngineError::GameNotFound`]
    #[instrument(skip(self))]
    pub fn play_ai_turn(&self, game_id: &str) -> Result<TurnResolution, EngineError> {
        let game = require_game(self.store.as_ref(), game_id)?;
        let turn = *game.turn_number();
        match game.phase() {
            TurnPhase::AwaitingAiMove => {}
            TurnPhase::Finished => {
                return Err(EngineError::GameAlreadyFinished {
                    game_id: game_id.to_string(),
                });
            }
            phase => {
                warn!(%phase, "AI move requested on a collective turn");
                return Err(not_your_turn(&game, turn));
            }
        }

        let side = *game.ai_side();
        let legal: Vec<Position> = legal_moves(game.board(), side).into_iter().collect();
        if legal.is_empty() {
            info!(%side, turn, "AI has no legal move, forfeiting");
            return self.advance(&game, *game.board(), TurnKind::Forfeit);
        }

        let choice = self.selector.select_move(game.board(), side, &legal);
        let position = match choice {
            Some(position) if legal.contains(&position) => position,
            other => {
                warn!(selector = self.selector.name(), ?other, "Selector returned an invalid move");
                return Err(EngineError::InvalidAiMove {
                    selector: self.selector.name().to_string(),
                    position: other,
                });
            }
        };

        let outcome = apply_move(game.board(), side, position)
            .map_err(|reason| EngineError::IllegalMove { position, reason })?;
        info!(%position, flipped = outcome.flipped_count(), "AI move chosen");

        let kind = TurnKind::Applied {
            position,
            flipped: outcome.flipped_count() as u32,
        };
        self.advance(&game, outcome.board, kind)
    }

    /// Resolves the collective turn `expected_turn` by applying the leading
    /// candidate, or forfeiting when there is none.
    ///
    /// A turn that has already been resolved is a no-op reported as
    /// [`TurnKind::AlreadyResolved`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotYourTurn`] if `expected_turn` is ahead of the game
    ///   or the AI is to move
    /// - [`EngineError::GameAlreadyFinished`] / [`EngineError::GameNotFound`]
    #[instrument(skip(self))]
    pub fn resolve_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
    ) -> Result<TurnResolution, EngineError> {
        let game = require_game(self.store.as_ref(), game_id)?;
        let current = *game.turn_number();

        if expected_turn < current {
            info!(expected_turn, current, "Turn already resolved");
            return Ok(TurnResolution {
                turn_number: expected_turn,
                kind: TurnKind::AlreadyResolved,
                game,
            });
        }
        if game.is_finished() {
            return Err(EngineError::GameAlreadyFinished {
                game_id: game_id.to_string(),
            });
        }
        if expected_turn > current || game.phase() != TurnPhase::AwaitingVotes {
            warn!(expected_turn, current, phase = %game.phase(), "Resolution out of turn");
            return Err(not_your_turn(&game, expected_turn));
        }

        info!(phase = %TurnPhase::Resolving, turn = current, "Resolving collective turn");
        match self.store.resolve_collective_turn(game_id, current)? {
            ResolveOutcome::Resolved { game, applied } => {
                let kind = match applied {
                    Some(best) => {
                        info!(
                            candidate_id = %best.id(),
                            position = %best.position(),
                            votes = best.vote_count(),
                            "Leading candidate applied"
                        );
                        TurnKind::Applied {
                            position: *best.position(),
                            flipped: *best.flipped_count(),
                        }
                    }
                    None => {
                        info!(turn = current, "No candidates, collective forfeits");
                        TurnKind::Forfeit
                    }
                };
                Ok(self.advanced(current, kind, game))
            }
            ResolveOutcome::Rejected(conflict) => self.rejected(game_id, current, conflict),
        }
    }

    /// Writes `board` as the result of `game`'s current turn, finishing the
    /// game if it is over.
    fn advance(&self, game: &Game, board: Board, kind: TurnKind) -> Result<TurnResolution, EngineError> {
        let turn = *game.turn_number();
        match self
            .store
            .advance_turn(game.id(), turn, board, game.winner_after(&board))?
        {
            AdvanceOutcome::Advanced(next) => Ok(self.advanced(turn, kind, next)),
            AdvanceOutcome::Rejected(conflict) => self.rejected(game.id(), turn, conflict),
        }
    }

    fn advanced(&self, turn: u32, kind: TurnKind, next: Game) -> TurnResolution {
        info!(game_id = %next.id(), turn = next.turn_number(), phase = %next.phase(), "Turn advanced");
        if let Some(winner) = next.winner() {
            info!(game_id = %next.id(), %winner, "Game finished");
        }
        TurnResolution {
            turn_number: turn,
            kind,
            game: next,
        }
    }

    /// A write that lost the race on `turn` reports the turn as already
    /// resolved; any other conflict is an error.
    fn rejected(
        &self,
        game_id: &str,
        turn: u32,
        conflict: Conflict,
    ) -> Result<TurnResolution, EngineError> {
        match conflict {
            Conflict::StaleTurn { current } => {
                info!(turn, current, "Lost resolution race");
                let latest = require_game(self.store.as_ref(), game_id)?;
                Ok(TurnResolution {
                    turn_number: turn,
                    kind: TurnKind::AlreadyResolved,
                    game: latest,
                })
            }
            conflict => Err(turn_rejection(conflict, game_id, turn)),
        }
    }
}

//! Shared precondition checks for engine operations.

use tracing::warn;

use super::error::EngineError;
use crate::store::{Conflict, Game, GameStore, StoreError};

/// Loads a game or fails with [`EngineError::GameNotFound`].
pub(super) fn require_game(store: &dyn GameStore, game_id: &str) -> Result<Game, EngineError> {
    store.load_game(game_id)?.ok_or_else(|| {
        warn!(game_id, "Game not found");
        EngineError::GameNotFound {
            game_id: game_id.to_string(),
        }
    })
}

/// Fails unless `game` is active and on `turn_number`.
pub(super) fn require_turn(game: &Game, turn_number: u32) -> Result<(), EngineError> {
    if game.is_finished() {
        warn!(game_id = %game.id(), "Game already finished");
        return Err(EngineError::GameAlreadyFinished {
            game_id: game.id().clone(),
        });
    }
    if *game.turn_number() != turn_number {
        warn!(game_id = %game.id(), requested = turn_number, current = game.turn_number(), "Stale turn");
        return Err(not_your_turn(game, turn_number));
    }
    Ok(())
}

/// Builds [`EngineError::NotYourTurn`] against the game's current turn.
pub(super) fn not_your_turn(game: &Game, requested_turn: u32) -> EngineError {
    EngineError::NotYourTurn {
        game_id: game.id().clone(),
        requested_turn,
        current_turn: *game.turn_number(),
    }
}

/// Maps a turn-level store conflict to the matching engine error.
///
/// Vote-specific conflicts are mapped by the caller, which knows the
/// voter and candidate involved.
#[track_caller]
pub(super) fn turn_rejection(conflict: Conflict, game_id: &str, requested_turn: u32) -> EngineError {
    warn!(game_id, requested_turn, ?conflict, "Write rejected");
    match conflict {
        Conflict::GameNotFound => EngineError::GameNotFound {
            game_id: game_id.to_string(),
        },
        Conflict::GameFinished => EngineError::GameAlreadyFinished {
            game_id: game_id.to_string(),
        },
        Conflict::StaleTurn { current } => EngineError::NotYourTurn {
            game_id: game_id.to_string(),
            requested_turn,
            current_turn: current,
        },
        Conflict::UnknownCandidate | Conflict::DuplicateVote => EngineError::Store(
            StoreError::new(format!("unexpected conflict {:?} outside a vote", conflict)),
        ),
    }
}

//! In-process game store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use super::error::StoreError;
use super::models::{Candidate, Game, GameId, GameStatus, ParticipantId, leading};
use super::pagination::{Page, PageRequest, paginate};
use super::port::{
    AdvanceOutcome, Conflict, GameStore, ProposeOutcome, ResolveOutcome, VoteOutcome,
};
use crate::games::othello::{Board, Winner};

type TurnKey = (GameId, u32);

#[derive(Debug, Default)]
struct MemoryState {
    games: HashMap<GameId, Game>,
    candidates: HashMap<TurnKey, Vec<Candidate>>,
    voters: HashSet<(GameId, u32, ParticipantId)>,
}

impl MemoryState {
    /// Checks that `game_id` exists, is active and is on `turn_number`.
    fn open_turn(&self, game_id: &str, turn_number: u32) -> Result<(), Conflict> {
        let game = self.games.get(game_id).ok_or(Conflict::GameNotFound)?;
        if game.is_finished() {
            return Err(Conflict::GameFinished);
        }
        if *game.turn_number() != turn_number {
            return Err(Conflict::StaleTurn {
                current: *game.turn_number(),
            });
        }
        Ok(())
    }
}

/// Game store held in memory.
///
/// Every operation runs inside one short critical section with no I/O,
/// which makes each conditional write atomic. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory game store");
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::new("memory store lock poisoned"))
    }
}

impl GameStore for MemoryStore {
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.games.contains_key(game.id()) {
            return Err(StoreError::new(format!("game {} already exists", game.id())));
        }
        state.games.insert(game.id().clone(), game.clone());
        debug!("Game stored");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_game(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self.lock()?.games.get(game_id).cloned())
    }

    #[instrument(skip(self))]
    fn list_games(
        &self,
        status: Option<GameStatus>,
        request: &PageRequest,
    ) -> Result<Page<Game>, StoreError> {
        let games: Vec<Game> = self
            .lock()?
            .games
            .values()
            .filter(|game| status.is_none_or(|s| *game.status() == s))
            .cloned()
            .collect();
        Ok(paginate(games, request))
    }

    #[instrument(skip(self, candidate), fields(game_id = %candidate.game_id(), turn = candidate.turn_number(), position = %candidate.position()))]
    fn insert_candidate(&self, candidate: Candidate) -> Result<ProposeOutcome, StoreError> {
        let mut state = self.lock()?;
        if let Err(conflict) = state.open_turn(candidate.game_id(), *candidate.turn_number()) {
            return Ok(ProposeOutcome::Rejected(conflict));
        }

        let key = (candidate.game_id().clone(), *candidate.turn_number());
        let turn = state.candidates.entry(key).or_default();
        if let Some(existing) = turn.iter().find(|c| c.position() == candidate.position()) {
            return Ok(ProposeOutcome::Existing(existing.clone()));
        }

        let stored = candidate.with_sequence(turn.len() as u64 + 1);
        turn.push(stored.clone());
        Ok(ProposeOutcome::Inserted(stored))
    }

    #[instrument(skip(self))]
    fn load_candidates(
        &self,
        game_id: &str,
        turn_number: u32,
    ) -> Result<Vec<Candidate>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .candidates
            .get(&(game_id.to_string(), turn_number))
            .cloned()
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    fn record_vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteOutcome, StoreError> {
        let mut state = self.lock()?;
        if let Err(conflict) = state.open_turn(game_id, turn_number) {
            return Ok(VoteOutcome::Rejected(conflict));
        }

        let voter_key = (game_id.to_string(), turn_number, voter_id.to_string());
        if state.voters.contains(&voter_key) {
            return Ok(VoteOutcome::Rejected(Conflict::DuplicateVote));
        }

        let Some(candidate) = state
            .candidates
            .get_mut(&(game_id.to_string(), turn_number))
            .and_then(|turn| turn.iter_mut().find(|c| c.id() == candidate_id))
        else {
            return Ok(VoteOutcome::Rejected(Conflict::UnknownCandidate));
        };

        let vote_count = candidate.record_vote();
        state.voters.insert(voter_key);
        Ok(VoteOutcome::Counted { vote_count })
    }

    #[instrument(skip(self, board))]
    fn advance_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
        board: Board,
        winner: Option<Winner>,
    ) -> Result<AdvanceOutcome, StoreError> {
        let mut state = self.lock()?;
        let Some(game) = state.games.get_mut(game_id) else {
            return Ok(AdvanceOutcome::Rejected(Conflict::GameNotFound));
        };
        if *game.turn_number() != expected_turn {
            return Ok(AdvanceOutcome::Rejected(Conflict::StaleTurn {
                current: *game.turn_number(),
            }));
        }
        if game.is_finished() {
            return Ok(AdvanceOutcome::Rejected(Conflict::GameFinished));
        }

        let next = game.advanced(board, winner);
        *game = next.clone();
        Ok(AdvanceOutcome::Advanced(next))
    }

    #[instrument(skip(self))]
    fn resolve_collective_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
    ) -> Result<ResolveOutcome, StoreError> {
        let mut state = self.lock()?;
        let MemoryState {
            games, candidates, ..
        } = &mut *state;

        let Some(game) = games.get_mut(game_id) else {
            return Ok(ResolveOutcome::Rejected(Conflict::GameNotFound));
        };
        if *game.turn_number() != expected_turn {
            return Ok(ResolveOutcome::Rejected(Conflict::StaleTurn {
                current: *game.turn_number(),
            }));
        }
        if game.is_finished() {
            return Ok(ResolveOutcome::Rejected(Conflict::GameFinished));
        }

        let applied = candidates
            .get(&(game_id.to_string(), expected_turn))
            .and_then(|turn| leading(turn))
            .cloned();
        let board = applied
            .as_ref()
            .map_or(*game.board(), |leader| *leader.resulting_board());

        let next = game.advanced(board, game.winner_after(&board));
        *game = next.clone();
        debug!(applied = applied.is_some(), "Collective turn closed");
        Ok(ResolveOutcome::Resolved {
            game: next,
            applied,
        })
    }
}

//! Facade over the engine for transport adapters.

use derive_getters::Getters;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::candidates::CandidateStore;
use super::coordinator::{TurnCoordinator, TurnResolution};
use super::error::EngineError;
use super::guards::require_game;
use crate::ai::MoveSelector;
use crate::config::EngineConfig;
use crate::games::othello::{Position, Score, Side, legal_moves};
use crate::store::{Candidate, Cursor, Game, GameStatus, GameStore, Page, PageRequest, SqliteStore};

/// Snapshot of a game for display.
#[derive(Debug, Clone, Serialize, Getters)]
pub struct GameView {
    /// The stored game.
    game: Game,
    /// Legal moves for the side to move; empty once finished.
    legal_moves: Vec<Position>,
    /// Current disk counts.
    score: Score,
    /// Candidates proposed for the current turn.
    candidates: Vec<Candidate>,
}

/// Entry point for every game operation.
#[derive(Clone)]
pub struct GameService {
    store: Arc<dyn GameStore>,
    candidates: CandidateStore,
    coordinator: TurnCoordinator,
    default_page_size: usize,
    max_page_size: usize,
}

impl std::fmt::Debug for GameService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameService")
            .field("coordinator", &self.coordinator)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl GameService {
    /// Creates a service over `store` with default listing limits.
    #[instrument(skip(store, selector), fields(selector = selector.name()))]
    pub fn new(store: Arc<dyn GameStore>, selector: Arc<dyn MoveSelector>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            candidates: CandidateStore::new(Arc::clone(&store)),
            coordinator: TurnCoordinator::new(Arc::clone(&store), selector),
            store,
            default_page_size: *defaults.default_page_size(),
            max_page_size: *defaults.max_page_size(),
        }
    }

    /// Sets the page size used when a listing gives none, and the cap on
    /// any requested size.
    pub fn with_page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Opens the SQLite store and selector named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the database cannot be opened.
    #[instrument(skip(config), fields(db = %config.database_path()))]
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let store = SqliteStore::open_with_timeout(config.database_path(), *config.busy_timeout_ms())?;
        info!(strategy = %config.ai_strategy(), "Engine configured");
        Ok(Self::new(Arc::new(store), config.ai_strategy().selector())
            .with_page_sizes(*config.default_page_size(), *config.max_page_size()))
    }

    /// Candidate proposal and voting.
    pub fn candidate_store(&self) -> &CandidateStore {
        &self.candidates
    }

    /// Turn state machine.
    pub fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    /// Creates a new game with the AI playing `ai_side`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on persistence failure.
    #[instrument(skip(self))]
    pub fn create_game(&self, ai_side: Side) -> Result<Game, EngineError> {
        let game = Game::new(ai_side);
        self.store.insert_game(&game)?;
        info!(game_id = %game.id(), %ai_side, phase = %game.phase(), "Game created");
        Ok(game)
    }

    /// Board, status, winner, legal moves and open candidates of a game.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameNotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub fn game(&self, game_id: &str) -> Result<GameView, EngineError> {
        let game = require_game(self.store.as_ref(), game_id)?;
        let legal_moves = if game.is_finished() {
            Vec::new()
        } else {
            legal_moves(game.board(), game.side_to_move()).into_iter().collect()
        };
        let candidates = self.candidates.candidates(game_id, *game.turn_number())?;
        debug!(legal = legal_moves.len(), candidates = candidates.len(), "Game loaded");
        Ok(GameView {
            score: Score::of(game.board()),
            game,
            legal_moves,
            candidates,
        })
    }

    /// Lists games newest first. `limit` defaults to the configured page
    /// size and is capped at the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on persistence failure.
    #[instrument(skip(self))]
    pub fn list_games(
        &self,
        status: Option<GameStatus>,
        limit: Option<usize>,
        cursor: Option<Cursor>,
    ) -> Result<Page<Game>, EngineError> {
        let limit = limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = self.store.list_games(status, &PageRequest::new(limit, cursor))?;
        debug!(limit, returned = page.items().len(), "Games listed");
        Ok(page)
    }

    /// See [`CandidateStore::propose`].
    ///
    /// # Errors
    ///
    /// As [`CandidateStore::propose`].
    #[instrument(skip(self))]
    pub fn propose(
        &self,
        game_id: &str,
        turn_number: u32,
        proposer_id: &str,
        position: Position,
    ) -> Result<Candidate, EngineError> {
        self.candidates.propose(game_id, turn_number, proposer_id, position)
    }

    /// See [`CandidateStore::vote`].
    ///
    /// # Errors
    ///
    /// As [`CandidateStore::vote`].
    #[instrument(skip(self))]
    pub fn vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<u32, EngineError> {
        self.candidates.vote(game_id, turn_number, voter_id, candidate_id)
    }

    /// See [`CandidateStore::leading_candidate`].
    ///
    /// # Errors
    ///
    /// As [`CandidateStore::leading_candidate`].
    #[instrument(skip(self))]
    pub fn leading_candidate(
        &self,
        game_id: &str,
        turn_number: u32,
    ) -> Result<Option<Candidate>, EngineError> {
        self.candidates.leading_candidate(game_id, turn_number)
    }

    /// See [`TurnCoordinator::resolve_turn`].
    ///
    /// # Errors
    ///
    /// As [`TurnCoordinator::resolve_turn`].
    #[instrument(skip(self))]
    pub fn resolve_turn(&self, game_id: &str, turn_number: u32) -> Result<TurnResolution, EngineError> {
        self.coordinator.resolve_turn(game_id, turn_number)
    }

    /// See [`TurnCoordinator::play_ai_turn`].
    ///
    /// # Errors
    ///
    /// As [`TurnCoordinator::play_ai_turn`].
    #[instrument(skip(self))]
    pub fn play_ai_turn(&self, game_id: &str) -> Result<TurnResolution, EngineError> {
        self.coordinator.play_ai_turn(game_id)
    }
}

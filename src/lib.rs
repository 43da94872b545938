//! Collective Othello library - turn and vote resolution engine
//!
//! A crowd of anonymous participants plays one side of an Othello game
//! against an AI. Participants propose candidate moves and vote on them;
//! each collective turn resolves to the most-voted candidate.
//!
//! # Architecture
//!
//! - **Games**: Othello board, move resolution and end-of-game rules
//! - **AI**: Move selection seam for the AI side
//! - **Store**: Persistence port with in-memory and SQLite adapters
//! - **Engine**: Candidates, votes and the turn state machine
//!
//! # Example
//!
//! ```
//! use collective_othello::{GameService, MemoryStore, Position, Side, AiStrategy};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), collective_othello::EngineError> {
//! let service = GameService::new(Arc::new(MemoryStore::new()), AiStrategy::MostFlips.selector());
//! let game = service.create_game(Side::White)?;
//!
//! // Black (the collective) opens
//! let d3 = Position::new(2, 3).expect("on board");
//! let candidate = service.propose(game.id(), 0, "alice", d3)?;
//! service.vote(game.id(), 0, "bob", candidate.id())?;
//! service.resolve_turn(game.id(), 0)?;
//!
//! // Now the AI replies
//! service.play_ai_turn(game.id())?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod ai;
mod config;
mod engine;
mod games;
mod store;

// Crate-level exports - Othello rules
pub use games::othello::{
    BOARD_SIZE, Board, BoardParseError, CapturesDisks, Cell, CellIsEmpty, Contract, Direction,
    DiskConservation, Move, MoveContract, MoveError, MoveOutcome, Position, PositionParseError,
    Score, Side, SinglePlacement, TransitionInvariant, Winner, apply_move, determine_winner,
    flips_for, has_any_legal_move, is_game_over, is_legal, legal_moves,
};

// Crate-level exports - AI move selection
pub use ai::{AiStrategy, FirstLegal, MoveSelector, MostFlips};

// Crate-level exports - Persistence
pub use store::{
    AdvanceOutcome, Candidate, CandidateId, Conflict, Cursor, CursorError, DEFAULT_BUSY_TIMEOUT_MS,
    Game, GameId, GameStatus, GameStore, MIGRATIONS, MemoryStore, Page, PageRequest,
    ParticipantId, ProposeOutcome, ResolveOutcome, SqliteStore, StoreError, TurnPhase,
    VoteOutcome, leading,
};

// Crate-level exports - Engine
pub use engine::{
    CandidateStore, EngineError, GameService, GameView, TurnCoordinator, TurnKind, TurnResolution,
};

// Crate-level exports - Configuration
pub use config::{ConfigError, DEFAULT_CONFIG_PATH, EngineConfig};

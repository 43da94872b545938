//! Persistence for games, candidate moves and votes.

mod error;
mod memory;
mod models;
mod pagination;
mod port;
mod schema; // Diesel generated schema - internal use only
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{
    Candidate, CandidateId, Game, GameId, GameStatus, ParticipantId, TurnPhase, leading,
};
pub use pagination::{Cursor, CursorError, Page, PageRequest};
pub use port::{
    AdvanceOutcome, Conflict, GameStore, ProposeOutcome, ResolveOutcome, VoteOutcome,
};
pub use sqlite::{DEFAULT_BUSY_TIMEOUT_MS, MIGRATIONS, SqliteStore};

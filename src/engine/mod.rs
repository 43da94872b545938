//! Turn and vote resolution for collective-vs-AI games.

mod candidates;
mod coordinator;
mod error;
mod guards;
mod service;

pub use candidates::CandidateStore;
pub use coordinator::{TurnCoordinator, TurnKind, TurnResolution};
pub use error::EngineError;
pub use service::{GameService, GameView};

//! Tests for turn resolution and the turn state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use collective_othello::{
    AdvanceOutcome, Board, Candidate, EngineError, FirstLegal, Game, GameService, GameStatus,
    GameStore, MemoryStore, MostFlips, MoveSelector, Page, PageRequest, Position, ProposeOutcome,
    ResolveOutcome, Side, SqliteStore, StoreError, TurnKind, TurnPhase, VoteOutcome, Winner,
    determine_winner, leading,
};
use tempfile::NamedTempFile;

fn pos(row: usize, col: usize) -> Position {
    Position::new(row, col).expect("on board")
}

fn memory_service() -> (Arc<MemoryStore>, GameService) {
    let store = Arc::new(MemoryStore::new());
    let service = GameService::new(store.clone(), Arc::new(FirstLegal));
    (store, service)
}

/// Resolves the same turn from many threads at once and checks that exactly
/// one resolution applied a move.
fn assert_single_resolution(service: &GameService) {
    let game = service.create_game(Side::White).unwrap();
    let candidate = service.propose(game.id(), 0, "alice", pos(2, 3)).unwrap();
    service.vote(game.id(), 0, "bob", candidate.id()).unwrap();

    let kinds: Vec<TurnKind> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| service.resolve_turn(game.id(), 0)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().kind().clone())
            .collect()
    });

    let applied = kinds.iter().filter(|k| matches!(k, TurnKind::Applied { .. })).count();
    let no_ops = kinds.iter().filter(|k| **k == TurnKind::AlreadyResolved).count();
    assert_eq!(applied, 1);
    assert_eq!(no_ops, 7);

    let view = service.game(game.id()).unwrap();
    assert_eq!(*view.game().turn_number(), 1);
    assert_eq!(view.game().board(), candidate.resulting_board());
}

#[test]
fn test_concurrent_resolution_applies_once_in_memory() {
    let (_store, service) = memory_service();
    assert_single_resolution(&service);
}

#[test]
fn test_concurrent_resolution_applies_once_in_sqlite() {
    let db = NamedTempFile::new().expect("Failed to create temp file");
    let store = SqliteStore::open(db.path().to_str().expect("Invalid path")).unwrap();
    let service = GameService::new(Arc::new(store), Arc::new(FirstLegal));
    assert_single_resolution(&service);
}

#[test]
fn test_resolving_twice_is_a_no_op() {
    let (_store, service) = memory_service();
    let game = service.create_game(Side::White).unwrap();
    service.propose(game.id(), 0, "alice", pos(2, 3)).unwrap();

    let first = service.resolve_turn(game.id(), 0).unwrap();
    let second = service.resolve_turn(game.id(), 0).unwrap();

    assert!(matches!(first.kind(), TurnKind::Applied { .. }));
    assert_eq!(*second.kind(), TurnKind::AlreadyResolved);
    assert_eq!(second.game(), first.game());
}

#[test]
fn test_zero_candidates_forfeits_collective_turn() {
    let (_store, service) = memory_service();
    let game = service.create_game(Side::White).unwrap();

    let resolution = service.resolve_turn(game.id(), 0).unwrap();
    assert_eq!(*resolution.kind(), TurnKind::Forfeit);
    assert_eq!(*resolution.game().turn_number(), 1);
    assert_eq!(*resolution.game().board(), Board::initial());
    assert_eq!(resolution.phase(), TurnPhase::AwaitingAiMove);
}

#[test]
fn test_resolution_out_of_turn() {
    let (_store, service) = memory_service();

    let ahead = service.create_game(Side::White).unwrap();
    let result = service.resolve_turn(ahead.id(), 3);
    assert!(matches!(
        result,
        Err(EngineError::NotYourTurn { requested_turn: 3, current_turn: 0, .. })
    ));

    let ai_first = service.create_game(Side::Black).unwrap();
    let result = service.resolve_turn(ai_first.id(), 0);
    assert!(matches!(result, Err(EngineError::NotYourTurn { .. })));

    let missing = service.resolve_turn("missing", 0);
    assert!(matches!(missing, Err(EngineError::GameNotFound { .. })));
}

#[test]
fn test_ai_turn_alternates_with_collective() {
    let (_store, service) = memory_service();
    let game = service.create_game(Side::Black).unwrap();

    let ai = service.play_ai_turn(game.id()).unwrap();
    assert!(matches!(ai.kind(), TurnKind::Applied { flipped: 1, .. }));
    assert_eq!(ai.phase(), TurnPhase::AwaitingVotes);
    assert_eq!(ai.game().board().count(Side::Black), 4);

    let again = service.play_ai_turn(game.id());
    assert!(matches!(again, Err(EngineError::NotYourTurn { .. })));
}

#[test]
fn test_ai_without_moves_forfeits() {
    let (store, service) = memory_service();
    let game = service.create_game(Side::White).unwrap();

    // White cannot bracket the corner disk; Black still can.
    let board = Board::empty()
        .with(pos(0, 0), collective_othello::Cell::Occupied(Side::Black))
        .with(pos(0, 1), collective_othello::Cell::Occupied(Side::White));
    store.advance_turn(game.id(), 0, board, None).unwrap();

    let resolution = service.play_ai_turn(game.id()).unwrap();
    assert_eq!(*resolution.kind(), TurnKind::Forfeit);
    assert_eq!(*resolution.game().turn_number(), 2);
    assert_eq!(*resolution.game().board(), board);
    assert_eq!(resolution.phase(), TurnPhase::AwaitingVotes);
}

#[test]
fn test_forfeit_on_dead_board_finishes_game() {
    let (store, service) = memory_service();
    let game = service.create_game(Side::White).unwrap();

    let board = Board::empty().with(pos(4, 4), collective_othello::Cell::Occupied(Side::Black));
    store.advance_turn(game.id(), 0, board, None).unwrap();

    let resolution = service.play_ai_turn(game.id()).unwrap();
    assert_eq!(*resolution.kind(), TurnKind::Forfeit);
    assert_eq!(resolution.phase(), TurnPhase::Finished);
    assert_eq!(resolution.winner(), Some(Winner::Collective));
}

#[test]
fn test_last_move_finishes_game_and_locks_it() {
    let (store, service) = memory_service();
    let game = service.create_game(Side::White).unwrap();

    // One empty corner; only Black can take it.
    let mut cells = String::from(".WB");
    cells.push_str(&"B".repeat(61));
    let board = Board::parse(&cells).unwrap();
    store.advance_turn(game.id(), 0, board, None).unwrap();

    let ai = service.play_ai_turn(game.id()).unwrap();
    assert_eq!(*ai.kind(), TurnKind::Forfeit);

    let candidate = service.propose(game.id(), 2, "alice", pos(0, 0)).unwrap();
    service.vote(game.id(), 2, "bob", candidate.id()).unwrap();
    let last = service.resolve_turn(game.id(), 2).unwrap();

    assert_eq!(last.phase(), TurnPhase::Finished);
    assert_eq!(last.winner(), Some(Winner::Collective));
    assert_eq!(*last.game().status(), GameStatus::Finished);
    assert!(last.game().board().is_full());

    assert!(matches!(
        service.propose(game.id(), 3, "alice", pos(0, 0)),
        Err(EngineError::GameAlreadyFinished { .. })
    ));
    assert!(matches!(
        service.vote(game.id(), 3, "carol", candidate.id()),
        Err(EngineError::GameAlreadyFinished { .. })
    ));
    assert!(matches!(
        service.resolve_turn(game.id(), 3),
        Err(EngineError::GameAlreadyFinished { .. })
    ));
    assert!(matches!(
        service.play_ai_turn(game.id()),
        Err(EngineError::GameAlreadyFinished { .. })
    ));
    assert_eq!(
        *service.resolve_turn(game.id(), 2).unwrap().kind(),
        TurnKind::AlreadyResolved
    );
    assert!(service.game(game.id()).unwrap().legal_moves().is_empty());
}

struct CornerGrabber;

impl MoveSelector for CornerGrabber {
    fn select_move(&self, _board: &Board, _side: Side, _legal: &[Position]) -> Option<Position> {
        Position::new(0, 0)
    }

    fn name(&self) -> &str {
        "corner_grabber"
    }
}

#[test]
fn test_selector_returning_illegal_move_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let service = GameService::new(store, Arc::new(CornerGrabber));
    let game = service.create_game(Side::Black).unwrap();

    let result = service.play_ai_turn(game.id());
    assert!(matches!(
        result,
        Err(EngineError::InvalidAiMove { ref selector, position: Some(_) }) if selector == "corner_grabber"
    ));
    assert_eq!(*service.game(game.id()).unwrap().game().turn_number(), 0);
}

fn play_to_the_end(service: &GameService, ai_side: Side) {
    let game = service.create_game(ai_side).unwrap();

    for _ in 0..200 {
        let view = service.game(game.id()).unwrap();
        let turn = *view.game().turn_number();
        match view.game().phase() {
            TurnPhase::Finished => {
                let winner = view.game().winner().unwrap();
                assert_eq!(winner, determine_winner(view.game().board(), ai_side));
                return;
            }
            TurnPhase::AwaitingAiMove => {
                service.play_ai_turn(game.id()).unwrap();
            }
            TurnPhase::AwaitingVotes => {
                for (i, position) in view.legal_moves().iter().take(3).enumerate() {
                    let voter = format!("voter-{}", i);
                    let candidate = service.propose(game.id(), turn, &voter, *position).unwrap();
                    service.vote(game.id(), turn, &voter, candidate.id()).unwrap();
                }
                service.resolve_turn(game.id(), turn).unwrap();
            }
            TurnPhase::Resolving => panic!("stored game is never mid-resolution"),
        }
    }
    panic!("game did not finish");
}

#[test]
fn test_full_game_reaches_a_winner() {
    let store = Arc::new(MemoryStore::new());
    let service = GameService::new(store, Arc::new(MostFlips));
    play_to_the_end(&service, Side::White);
    play_to_the_end(&service, Side::Black);
}

/// Store wrapper that casts extra votes the moment a resolver has read the
/// game, before its write lands.
struct LateVotes<S> {
    inner: S,
    armed: AtomicBool,
    ballots: Mutex<Vec<(String, String)>>,
    outcomes: Mutex<Vec<VoteOutcome>>,
}

impl<S: GameStore> LateVotes<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            ballots: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Queues `voter_id` to vote for `candidate_id` on the next game read.
    fn arm(&self, voter_id: &str, candidate_id: &str) {
        self.ballots
            .lock()
            .unwrap()
            .push((voter_id.to_string(), candidate_id.to_string()));
        self.armed.store(true, Ordering::SeqCst);
    }

    fn outcomes(&self) -> Vec<VoteOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl<S: GameStore> GameStore for LateVotes<S> {
    fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        self.inner.insert_game(game)
    }

    fn load_game(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        let game = self.inner.load_game(game_id)?;
        if let Some(loaded) = &game {
            if self.armed.swap(false, Ordering::SeqCst) {
                let turn = *loaded.turn_number();
                let ballots: Vec<_> = self.ballots.lock().unwrap().drain(..).collect();
                for (voter_id, candidate_id) in ballots {
                    let outcome = self.inner.record_vote(game_id, turn, &voter_id, &candidate_id)?;
                    self.outcomes.lock().unwrap().push(outcome);
                }
            }
        }
        Ok(game)
    }

    fn list_games(
        &self,
        status: Option<GameStatus>,
        request: &PageRequest,
    ) -> Result<Page<Game>, StoreError> {
        self.inner.list_games(status, request)
    }

    fn insert_candidate(&self, candidate: Candidate) -> Result<ProposeOutcome, StoreError> {
        self.inner.insert_candidate(candidate)
    }

    fn load_candidates(&self, game_id: &str, turn_number: u32) -> Result<Vec<Candidate>, StoreError> {
        self.inner.load_candidates(game_id, turn_number)
    }

    fn record_vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteOutcome, StoreError> {
        self.inner.record_vote(game_id, turn_number, voter_id, candidate_id)
    }

    fn advance_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
        board: Board,
        winner: Option<Winner>,
    ) -> Result<AdvanceOutcome, StoreError> {
        self.inner.advance_turn(game_id, expected_turn, board, winner)
    }

    fn resolve_collective_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
    ) -> Result<ResolveOutcome, StoreError> {
        self.inner.resolve_collective_turn(game_id, expected_turn)
    }
}

/// Votes that land after the resolver has read the game decide the applied
/// move, because the tally is read inside the resolving write.
fn assert_late_votes_count<S: GameStore + 'static>(inner: S) {
    let store = Arc::new(LateVotes::new(inner));
    let service = GameService::new(store.clone(), Arc::new(FirstLegal));
    let game = service.create_game(Side::White).unwrap();

    let early = service.propose(game.id(), 0, "alice", pos(2, 3)).unwrap();
    let late = service.propose(game.id(), 0, "carol", pos(3, 2)).unwrap();
    service.vote(game.id(), 0, "bob", early.id()).unwrap();

    store.arm("dave", late.id());
    store.arm("erin", late.id());
    let resolution = service.resolve_turn(game.id(), 0).unwrap();

    assert_eq!(
        store.outcomes(),
        vec![
            VoteOutcome::Counted { vote_count: 1 },
            VoteOutcome::Counted { vote_count: 2 },
        ]
    );
    assert_eq!(
        *resolution.kind(),
        TurnKind::Applied { position: pos(3, 2), flipped: 1 }
    );
    assert_eq!(resolution.game().board(), late.resulting_board());

    let tally = service.candidate_store().candidates(game.id(), 0).unwrap();
    assert_eq!(leading(&tally).map(|c| c.id()), Some(late.id()));
    assert_eq!(tally.iter().map(|c| *c.vote_count()).sum::<u32>(), 3);
}

#[test]
fn test_votes_after_resolver_reads_decide_the_move_in_memory() {
    assert_late_votes_count(MemoryStore::new());
}

#[test]
fn test_votes_after_resolver_reads_decide_the_move_in_sqlite() {
    let db = NamedTempFile::new().expect("Failed to create temp file");
    let store = SqliteStore::open(db.path().to_str().expect("Invalid path")).unwrap();
    assert_late_votes_count(store);
}

/// Races many voters against one resolver. Every vote must either be in the
/// tally that chose the applied move or be rejected for a stale turn.
fn assert_no_vote_lost_to_resolution(service: &GameService) {
    let game = service.create_game(Side::White).unwrap();
    let first = service.propose(game.id(), 0, "alice", pos(2, 3)).unwrap();
    let second = service.propose(game.id(), 0, "carol", pos(3, 2)).unwrap();
    let choices = [first.id().clone(), second.id().clone()];

    let (votes, resolution) = std::thread::scope(|scope| {
        let voters: Vec<_> = (0..20)
            .map(|i| {
                let candidate_id = if i % 3 == 0 { &choices[1] } else { &choices[0] };
                let game_id = game.id();
                scope.spawn(move || service.vote(game_id, 0, &format!("voter-{}", i), candidate_id))
            })
            .collect();
        let resolver = scope.spawn(|| service.resolve_turn(game.id(), 0));

        let votes: Vec<_> = voters.into_iter().map(|h| h.join().unwrap()).collect();
        (votes, resolver.join().unwrap().unwrap())
    });

    let counted = votes.iter().filter(|v| v.is_ok()).count();
    for vote in &votes {
        assert!(
            matches!(vote, Ok(_) | Err(EngineError::NotYourTurn { current_turn: 1, .. })),
            "unexpected vote result {:?}",
            vote
        );
    }

    let tally = service.candidate_store().candidates(game.id(), 0).unwrap();
    let stored: u32 = tally.iter().map(|c| *c.vote_count()).sum();
    assert_eq!(stored as usize, counted);

    let leader = leading(&tally).unwrap();
    assert_eq!(
        *resolution.kind(),
        TurnKind::Applied {
            position: *leader.position(),
            flipped: *leader.flipped_count(),
        }
    );
    assert_eq!(resolution.game().board(), leader.resulting_board());
    assert_eq!(service.coordinator().phase(game.id()).unwrap(), TurnPhase::AwaitingAiMove);
}

#[test]
fn test_racing_votes_are_counted_or_rejected_in_memory() {
    let (_store, service) = memory_service();
    assert_no_vote_lost_to_resolution(&service);
}

#[test]
fn test_racing_votes_are_counted_or_rejected_in_sqlite() {
    let db = NamedTempFile::new().expect("Failed to create temp file");
    let store = SqliteStore::open(db.path().to_str().expect("Invalid path")).unwrap();
    let service = GameService::new(Arc::new(store), Arc::new(FirstLegal));
    assert_no_vote_lost_to_resolution(&service);
}

#[test]
fn test_coordinator_reports_phase() {
    let (_store, service) = memory_service();
    let game = service.create_game(Side::Black).unwrap();
    let coordinator = service.coordinator();

    assert_eq!(coordinator.phase(game.id()).unwrap(), TurnPhase::AwaitingAiMove);
    service.play_ai_turn(game.id()).unwrap();
    assert_eq!(coordinator.phase(game.id()).unwrap(), TurnPhase::AwaitingVotes);
    assert!(matches!(
        coordinator.phase("missing"),
        Err(EngineError::GameNotFound { .. })
    ));
}

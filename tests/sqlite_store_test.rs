//! Tests for the SQLite game store.

use std::sync::Arc;

use collective_othello::{
    AdvanceOutcome, Board, Candidate, Conflict, FirstLegal, Game, GameService, GameStatus,
    GameStore, PageRequest, Position, ProposeOutcome, ResolveOutcome, Side, SqliteStore,
    VoteOutcome, Winner, apply_move,
};
use tempfile::NamedTempFile;

/// Creates a temporary database file and an opened store. The file handle
/// must stay in scope to keep the file alive.
fn setup_test_db() -> (NamedTempFile, SqliteStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::open(&db_path).expect("Failed to open store");
    (db_file, store)
}

fn pos(row: usize, col: usize) -> Position {
    Position::new(row, col).expect("on board")
}

fn opening_candidate(game: &Game, position: Position) -> Candidate {
    let outcome = apply_move(game.board(), Side::Black, position).expect("legal opening");
    Candidate::new(game.id().clone(), 0, position, "alice".to_string(), outcome)
}

#[test]
fn test_game_round_trip() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).expect("Insert failed");

    let loaded = store.load_game(game.id()).expect("Query failed");
    assert_eq!(loaded, Some(game));
}

#[test]
fn test_missing_game_is_none() {
    let (_db, store) = setup_test_db();
    assert!(store.load_game("nope").expect("Query failed").is_none());
}

#[test]
fn test_duplicate_game_insert_fails() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).expect("Insert failed");
    assert!(store.insert_game(&game).is_err());
}

#[test]
fn test_candidates_get_proposal_sequence() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();

    let mut ids = Vec::new();
    for position in [pos(5, 4), pos(2, 3), pos(3, 2)] {
        match store.insert_candidate(opening_candidate(&game, position)).unwrap() {
            ProposeOutcome::Inserted(candidate) => ids.push(candidate.id().clone()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let loaded = store.load_candidates(game.id(), 0).unwrap();
    let sequences: Vec<u64> = loaded.iter().map(|c| *c.sequence()).collect();
    let loaded_ids: Vec<String> = loaded.iter().map(|c| c.id().clone()).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(loaded_ids, ids);
    assert_eq!(loaded[0].resulting_board(), opening_candidate(&game, pos(5, 4)).resulting_board());
}

#[test]
fn test_same_position_returns_existing_row() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();

    let first = store.insert_candidate(opening_candidate(&game, pos(2, 3))).unwrap();
    let second = store.insert_candidate(opening_candidate(&game, pos(2, 3))).unwrap();

    let ProposeOutcome::Inserted(first) = first else {
        panic!("first proposal should insert");
    };
    assert_eq!(second, ProposeOutcome::Existing(first));
}

#[test]
fn test_duplicate_vote_leaves_count_unchanged() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();
    let ProposeOutcome::Inserted(candidate) =
        store.insert_candidate(opening_candidate(&game, pos(2, 3))).unwrap()
    else {
        panic!("proposal should insert");
    };

    let first = store.record_vote(game.id(), 0, "bob", candidate.id()).unwrap();
    let second = store.record_vote(game.id(), 0, "bob", candidate.id()).unwrap();
    assert_eq!(first, VoteOutcome::Counted { vote_count: 1 });
    assert_eq!(second, VoteOutcome::Rejected(Conflict::DuplicateVote));

    let unknown = store.record_vote(game.id(), 0, "carol", "missing").unwrap();
    assert_eq!(unknown, VoteOutcome::Rejected(Conflict::UnknownCandidate));

    let loaded = store.load_candidates(game.id(), 0).unwrap();
    assert_eq!(*loaded[0].vote_count(), 1);
}

#[test]
fn test_concurrent_votes_all_counted() {
    let (_db, store) = setup_test_db();
    let store = Arc::new(store);
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();
    let ProposeOutcome::Inserted(candidate) =
        store.insert_candidate(opening_candidate(&game, pos(2, 3))).unwrap()
    else {
        panic!("proposal should insert");
    };

    std::thread::scope(|scope| {
        for voter in 0..12 {
            let store = Arc::clone(&store);
            let (game_id, candidate_id) = (game.id(), candidate.id());
            scope.spawn(move || {
                let voter_id = format!("voter-{}", voter);
                let counted = store.record_vote(game_id, 0, &voter_id, candidate_id).unwrap();
                assert!(matches!(counted, VoteOutcome::Counted { .. }));
                let again = store.record_vote(game_id, 0, &voter_id, candidate_id).unwrap();
                assert_eq!(again, VoteOutcome::Rejected(Conflict::DuplicateVote));
            });
        }
    });

    let loaded = store.load_candidates(game.id(), 0).unwrap();
    assert_eq!(*loaded[0].vote_count(), 12);
}

#[test]
fn test_advance_turn_is_conditional() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();

    let stale = store.advance_turn(game.id(), 5, Board::initial(), None).unwrap();
    assert_eq!(stale, AdvanceOutcome::Rejected(Conflict::StaleTurn { current: 0 }));

    let AdvanceOutcome::Advanced(next) = store.advance_turn(game.id(), 0, Board::empty(), None).unwrap()
    else {
        panic!("advance should apply");
    };
    assert_eq!(*next.turn_number(), 1);
    assert_eq!(store.load_game(game.id()).unwrap(), Some(next));

    let again = store.advance_turn(game.id(), 0, Board::initial(), None).unwrap();
    assert_eq!(again, AdvanceOutcome::Rejected(Conflict::StaleTurn { current: 1 }));

    let missing = store.advance_turn("missing", 0, Board::initial(), None).unwrap();
    assert_eq!(missing, AdvanceOutcome::Rejected(Conflict::GameNotFound));
}

#[test]
fn test_resolve_applies_leader_and_closes_voting() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();
    let ProposeOutcome::Inserted(early) =
        store.insert_candidate(opening_candidate(&game, pos(2, 3))).unwrap()
    else {
        panic!("proposal should insert");
    };
    let ProposeOutcome::Inserted(voted) =
        store.insert_candidate(opening_candidate(&game, pos(5, 4))).unwrap()
    else {
        panic!("proposal should insert");
    };
    store.record_vote(game.id(), 0, "bob", voted.id()).unwrap();

    let stale = store.resolve_collective_turn(game.id(), 3).unwrap();
    assert_eq!(stale, ResolveOutcome::Rejected(Conflict::StaleTurn { current: 0 }));

    let ResolveOutcome::Resolved { game: next, applied } =
        store.resolve_collective_turn(game.id(), 0).unwrap()
    else {
        panic!("resolution should apply");
    };
    let applied = applied.expect("leader applied");
    assert_eq!(applied.id(), voted.id());
    assert_ne!(applied.id(), early.id());
    assert_eq!(*applied.vote_count(), 1);
    assert_eq!(*next.turn_number(), 1);
    assert_eq!(next.board(), voted.resulting_board());
    assert_eq!(store.load_game(game.id()).unwrap(), Some(next));

    let late = store.record_vote(game.id(), 0, "carol", early.id()).unwrap();
    assert_eq!(late, VoteOutcome::Rejected(Conflict::StaleTurn { current: 1 }));

    let again = store.resolve_collective_turn(game.id(), 0).unwrap();
    assert_eq!(again, ResolveOutcome::Rejected(Conflict::StaleTurn { current: 1 }));

    let missing = store.resolve_collective_turn("missing", 0).unwrap();
    assert_eq!(missing, ResolveOutcome::Rejected(Conflict::GameNotFound));
}

#[test]
fn test_resolve_without_candidates_keeps_board() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::White);
    store.insert_game(&game).unwrap();

    let ResolveOutcome::Resolved { game: next, applied } =
        store.resolve_collective_turn(game.id(), 0).unwrap()
    else {
        panic!("forfeit should apply");
    };
    assert!(applied.is_none());
    assert_eq!(*next.board(), Board::initial());
    assert_eq!(*next.status(), GameStatus::Active);

    store.advance_turn(game.id(), 1, Board::initial(), Some(Winner::Draw)).unwrap();
    let finished = store.resolve_collective_turn(game.id(), 2).unwrap();
    assert_eq!(finished, ResolveOutcome::Rejected(Conflict::GameFinished));
}

#[test]
fn test_winner_finishes_game_in_same_write() {
    let (_db, store) = setup_test_db();
    let game = Game::new(Side::Black);
    store.insert_game(&game).unwrap();

    store.advance_turn(game.id(), 0, Board::initial(), Some(Winner::Ai)).unwrap();
    let loaded = store.load_game(game.id()).unwrap().unwrap();
    assert_eq!(*loaded.status(), GameStatus::Finished);
    assert_eq!(*loaded.winner(), Some(Winner::Ai));

    let late = store.advance_turn(game.id(), 1, Board::initial(), None).unwrap();
    assert_eq!(late, AdvanceOutcome::Rejected(Conflict::GameFinished));

    let late_vote = store.record_vote(game.id(), 1, "bob", "any").unwrap();
    assert_eq!(late_vote, VoteOutcome::Rejected(Conflict::GameFinished));

    let finished = store
        .list_games(Some(GameStatus::Finished), &PageRequest::first(10))
        .unwrap();
    assert_eq!(finished.items().len(), 1);
}

#[test]
fn test_data_survives_reopen() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let game_id = {
        let store = SqliteStore::open(&db_path).unwrap();
        let service = GameService::new(Arc::new(store), Arc::new(FirstLegal));
        let game = service.create_game(Side::White).unwrap();
        let candidate = service.propose(game.id(), 0, "alice", pos(2, 3)).unwrap();
        service.vote(game.id(), 0, "bob", candidate.id()).unwrap();
        game.id().clone()
    };

    let reopened = SqliteStore::open(&db_path).unwrap();
    let service = GameService::new(Arc::new(reopened), Arc::new(FirstLegal));
    let view = service.game(&game_id).unwrap();
    assert_eq!(view.candidates().len(), 1);
    assert_eq!(*view.candidates()[0].vote_count(), 1);
}

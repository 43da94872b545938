//! Tests for cursor-based game listing.

use std::collections::HashSet;
use std::sync::Arc;

use collective_othello::{
    Board, Cursor, FirstLegal, GameService, GameStatus, GameStore, MemoryStore, Side, SqliteStore,
    Winner,
};
use tempfile::NamedTempFile;

fn create_games(service: &GameService, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let side = if i % 2 == 0 { Side::White } else { Side::Black };
            service.create_game(side).unwrap().id().clone()
        })
        .collect()
}

/// Walks every page and returns the ids in listing order plus the page count.
fn collect_pages(
    service: &GameService,
    status: Option<GameStatus>,
    page_size: usize,
) -> (Vec<String>, usize) {
    let mut ids = Vec::new();
    let mut cursor: Option<Cursor> = None;
    let mut pages = 0;

    loop {
        let page = service.list_games(status, Some(page_size), cursor.take()).unwrap();
        pages += 1;
        assert!(page.items().len() <= page_size);
        let (items, next) = page.into_parts();
        ids.extend(items.into_iter().map(|g| g.id().clone()));
        match next {
            Some(next) => cursor = Some(next.to_string().parse().unwrap()),
            None => return (ids, pages),
        }
    }
}

fn assert_complete(service: &GameService) {
    let created: HashSet<String> = create_games(service, 30).into_iter().collect();

    let (ids, pages) = collect_pages(service, None, 10);
    assert_eq!(pages, 3);
    assert_eq!(ids.len(), 30);
    assert_eq!(ids.iter().cloned().collect::<HashSet<_>>(), created);

    for size in [1, 3, 7, 29, 30, 31, 100] {
        let (ids, pages) = collect_pages(service, None, size);
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), 30, "page size {}", size);
        assert_eq!(unique, created, "page size {}", size);
        assert_eq!(pages, 30usize.div_ceil(size), "page size {}", size);
    }
}

#[test]
fn test_pages_cover_every_game_once_in_memory() {
    let service = GameService::new(Arc::new(MemoryStore::new()), Arc::new(FirstLegal));
    assert_complete(&service);
}

#[test]
fn test_pages_cover_every_game_once_in_sqlite() {
    let db = NamedTempFile::new().expect("Failed to create temp file");
    let store = SqliteStore::open(db.path().to_str().expect("Invalid path")).unwrap();
    let service = GameService::new(Arc::new(store), Arc::new(FirstLegal));
    assert_complete(&service);
}

#[test]
fn test_listing_is_newest_first() {
    let service = GameService::new(Arc::new(MemoryStore::new()), Arc::new(FirstLegal));
    create_games(&service, 12);

    let games = service.list_games(None, Some(12), None).unwrap().into_parts().0;
    for pair in games.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        assert!(
            newer.created_at() > older.created_at()
                || (newer.created_at() == older.created_at() && newer.id() > older.id())
        );
    }
}

#[test]
fn test_status_filter() {
    let store = Arc::new(MemoryStore::new());
    let service = GameService::new(store.clone(), Arc::new(FirstLegal));
    let ids = create_games(&service, 9);

    let finished: HashSet<String> = ids.iter().step_by(3).cloned().collect();
    for id in &finished {
        store.advance_turn(id, 0, Board::initial(), Some(Winner::Draw)).unwrap();
    }

    let (done, _) = collect_pages(&service, Some(GameStatus::Finished), 2);
    assert_eq!(done.into_iter().collect::<HashSet<_>>(), finished);

    let (active, _) = collect_pages(&service, Some(GameStatus::Active), 2);
    assert_eq!(active.len(), 6);
    assert!(active.iter().all(|id| !finished.contains(id)));
}

#[test]
fn test_limit_is_clamped() {
    let service = GameService::new(Arc::new(MemoryStore::new()), Arc::new(FirstLegal))
        .with_page_sizes(4, 5);
    create_games(&service, 8);

    assert_eq!(service.list_games(None, None, None).unwrap().items().len(), 4);
    assert_eq!(service.list_games(None, Some(50), None).unwrap().items().len(), 5);
    assert_eq!(service.list_games(None, Some(0), None).unwrap().items().len(), 1);
}

#[test]
fn test_foreign_cursor_rejected() {
    assert!("not-a-cursor".parse::<Cursor>().is_err());
    assert!("7c".parse::<Cursor>().is_err());
}

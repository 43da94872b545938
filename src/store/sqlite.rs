//! SQLite game store built on diesel.

use chrono::NaiveDateTime;
use diesel::connection::SimpleConnection;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use super::error::StoreError;
use super::models::{Candidate, Game, GameStatus, leading, now};
use super::pagination::{Cursor, Page, PageRequest};
use super::port::{
    AdvanceOutcome, Conflict, GameStore, ProposeOutcome, ResolveOutcome, VoteOutcome,
};
use super::schema;
use crate::games::othello::{Board, Position, Side, Winner};

/// Schema migrations, applied when a store is opened.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Default time a writer waits for the database lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::games)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct GameRow {
    id: String,
    status: String,
    ai_side: String,
    turn_number: i32,
    board: String,
    winner: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRow {
    fn from_game(game: &Game) -> Result<Self, StoreError> {
        Ok(Self {
            id: game.id().clone(),
            status: game.status().to_string(),
            ai_side: game.ai_side().to_string(),
            turn_number: to_db_turn(*game.turn_number())?,
            board: game.board().encode(),
            winner: game.winner().map(|w| w.to_string()),
            created_at: game.created_at().naive_utc(),
            updated_at: game.updated_at().naive_utc(),
        })
    }

    fn into_game(self) -> Result<Game, StoreError> {
        let winner = self.winner.as_deref().map(parse_column::<Winner>).transpose()?;
        Game::restore(
            self.id.clone(),
            parse_column(&self.status)?,
            parse_column::<Side>(&self.ai_side)?,
            from_db_turn(self.turn_number)?,
            parse_board(&self.board)?,
            winner,
            self.created_at.and_utc(),
            self.updated_at.and_utc(),
        )
        .ok_or_else(|| StoreError::new(format!("game {} has inconsistent status and winner", self.id)))
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::candidates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct CandidateRow {
    id: String,
    game_id: String,
    turn_number: i32,
    position: i32,
    proposer_id: String,
    vote_count: i32,
    flipped_count: i32,
    resulting_board: String,
    sequence: i64,
    created_at: NaiveDateTime,
}

impl CandidateRow {
    fn from_candidate(candidate: &Candidate) -> Result<Self, StoreError> {
        Ok(Self {
            id: candidate.id().clone(),
            game_id: candidate.game_id().clone(),
            turn_number: to_db_turn(*candidate.turn_number())?,
            position: candidate.position().index() as i32,
            proposer_id: candidate.proposer_id().clone(),
            vote_count: i32::try_from(*candidate.vote_count())
                .map_err(|_| StoreError::new("vote count out of range"))?,
            flipped_count: *candidate.flipped_count() as i32,
            resulting_board: candidate.resulting_board().encode(),
            sequence: i64::try_from(*candidate.sequence())
                .map_err(|_| StoreError::new("sequence out of range"))?,
            created_at: candidate.created_at().naive_utc(),
        })
    }

    fn into_candidate(self) -> Result<Candidate, StoreError> {
        let position = usize::try_from(self.position)
            .ok()
            .and_then(Position::from_index)
            .ok_or_else(|| StoreError::new(format!("candidate {} has invalid position", self.id)))?;
        let counter = |value: i32, what: &str| {
            u32::try_from(value).map_err(|_| StoreError::new(format!("negative {}", what)))
        };
        Ok(Candidate::restore(
            self.id,
            self.game_id,
            from_db_turn(self.turn_number)?,
            position,
            self.proposer_id,
            counter(self.vote_count, "vote count")?,
            counter(self.flipped_count, "flipped count")?,
            parse_board(&self.resulting_board)?,
            u64::try_from(self.sequence).map_err(|_| StoreError::new("negative sequence"))?,
            self.created_at.and_utc(),
        ))
    }
}

#[derive(Debug, Clone, Insertable, derive_new::new)]
#[diesel(table_name = schema::votes)]
struct NewVote {
    game_id: String,
    turn_number: i32,
    voter_id: String,
    candidate_id: String,
    created_at: NaiveDateTime,
}

#[track_caller]
fn to_db_turn(turn: u32) -> Result<i32, StoreError> {
    i32::try_from(turn).map_err(|_| StoreError::new(format!("turn {} out of range", turn)))
}

#[track_caller]
fn from_db_turn(turn: i32) -> Result<u32, StoreError> {
    u32::try_from(turn).map_err(|_| StoreError::new(format!("negative turn {}", turn)))
}

#[track_caller]
fn parse_column<T: FromStr>(value: &str) -> Result<T, StoreError> {
    value
        .parse::<T>()
        .map_err(|_| StoreError::new(format!("unrecognised column value '{}'", value)))
}

#[track_caller]
fn parse_board(value: &str) -> Result<Board, StoreError> {
    Board::parse(value).map_err(|e| StoreError::new(e.to_string()))
}

/// Returns why `(game_id, turn_number)` is not open for writes, if it isn't.
fn turn_conflict(
    conn: &mut SqliteConnection,
    game_id: &str,
    turn_number: u32,
) -> Result<Option<Conflict>, StoreError> {
    let row: Option<(String, i32)> = schema::games::table
        .find(game_id)
        .select((schema::games::status, schema::games::turn_number))
        .first(conn)
        .optional()?;

    let Some((status, current)) = row else {
        return Ok(Some(Conflict::GameNotFound));
    };
    if parse_column::<GameStatus>(&status)? == GameStatus::Finished {
        return Ok(Some(Conflict::GameFinished));
    }
    let current = from_db_turn(current)?;
    if current != turn_number {
        return Ok(Some(Conflict::StaleTurn { current }));
    }
    Ok(None)
}

/// Game store backed by an SQLite file.
///
/// Each call opens its own connection and runs its writes in one
/// `BEGIN IMMEDIATE` transaction, so the conditional checks and the
/// writes they guard commit or roll back together. Use a file path;
/// `":memory:"` gives every connection a separate empty database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
    busy_timeout_ms: u64,
}

impl SqliteStore {
    /// Opens the database at `db_path`, creating it and applying migrations
    /// as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open(db_path: impl AsRef<str>) -> Result<Self, StoreError> {
        Self::open_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Opens the database with a custom lock wait.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open_with_timeout(
        db_path: impl AsRef<str>,
        busy_timeout_ms: u64,
    ) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_string(),
            busy_timeout_ms,
        };

        let mut conn = store.connection()?;
        conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migration failed: {}", e)))?;

        info!(path = %store.db_path, migrations = applied.len(), "SQLite store ready");
        Ok(store)
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))?;
        Ok(conn)
    }
}

impl GameStore for SqliteStore {
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        diesel::insert_into(schema::games::table)
            .values(GameRow::from_game(game)?)
            .execute(&mut conn)?;
        debug!("Game stored");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_game(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        let mut conn = self.connection()?;
        schema::games::table
            .find(game_id)
            .first::<GameRow>(&mut conn)
            .optional()?
            .map(GameRow::into_game)
            .transpose()
    }

    #[instrument(skip(self))]
    fn list_games(
        &self,
        status: Option<GameStatus>,
        request: &PageRequest,
    ) -> Result<Page<Game>, StoreError> {
        use schema::games::dsl;

        let mut conn = self.connection()?;
        let mut query = dsl::games.into_boxed();

        if let Some(status) = status {
            query = query.filter(dsl::status.eq(status.to_string()));
        }
        if let Some(cursor) = request.cursor() {
            let created_at = cursor.created_at().naive_utc();
            query = query.filter(
                dsl::created_at.lt(created_at).or(dsl::created_at
                    .eq(created_at)
                    .and(dsl::id.lt(cursor.game_id().clone()))),
            );
        }

        let limit = *request.limit();
        let fetch = i64::try_from(limit + 1).map_err(|_| StoreError::new("page limit out of range"))?;
        let rows = query
            .order((dsl::created_at.desc(), dsl::id.desc()))
            .limit(fetch)
            .load::<GameRow>(&mut conn)?;

        let mut items = rows.into_iter().map(GameRow::into_game).collect::<Result<Vec<_>, _>>()?;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(Cursor::after)
        } else {
            None
        };

        debug!(count = items.len(), has_more = next_cursor.is_some(), "Games listed");
        Ok(Page::new(items, next_cursor))
    }

    #[instrument(skip(self, candidate), fields(game_id = %candidate.game_id(), turn = candidate.turn_number(), position = %candidate.position()))]
    fn insert_candidate(&self, candidate: Candidate) -> Result<ProposeOutcome, StoreError> {
        use schema::candidates::dsl;

        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            let turn = *candidate.turn_number();
            if let Some(conflict) = turn_conflict(conn, candidate.game_id(), turn)? {
                return Ok(ProposeOutcome::Rejected(conflict));
            }

            let db_turn = to_db_turn(turn)?;
            let existing = dsl::candidates
                .filter(dsl::game_id.eq(candidate.game_id()))
                .filter(dsl::turn_number.eq(db_turn))
                .filter(dsl::position.eq(candidate.position().index() as i32))
                .first::<CandidateRow>(conn)
                .optional()?;
            if let Some(row) = existing {
                return Ok(ProposeOutcome::Existing(row.into_candidate()?));
            }

            let last: Option<i64> = dsl::candidates
                .filter(dsl::game_id.eq(candidate.game_id()))
                .filter(dsl::turn_number.eq(db_turn))
                .select(max(dsl::sequence))
                .get_result(conn)?;
            let sequence = u64::try_from(last.unwrap_or(0))
                .map_err(|_| StoreError::new("negative sequence"))?
                + 1;
            let stored = candidate.with_sequence(sequence);

            diesel::insert_into(dsl::candidates)
                .values(CandidateRow::from_candidate(&stored)?)
                .execute(conn)?;
            Ok(ProposeOutcome::Inserted(stored))
        })
    }

    #[instrument(skip(self))]
    fn load_candidates(
        &self,
        game_id: &str,
        turn_number: u32,
    ) -> Result<Vec<Candidate>, StoreError> {
        use schema::candidates::dsl;

        let mut conn = self.connection()?;
        dsl::candidates
            .filter(dsl::game_id.eq(game_id))
            .filter(dsl::turn_number.eq(to_db_turn(turn_number)?))
            .order(dsl::sequence.asc())
            .load::<CandidateRow>(&mut conn)?
            .into_iter()
            .map(CandidateRow::into_candidate)
            .collect()
    }

    #[instrument(skip(self))]
    fn record_vote(
        &self,
        game_id: &str,
        turn_number: u32,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteOutcome, StoreError> {
        use schema::{candidates, votes};

        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            if let Some(conflict) = turn_conflict(conn, game_id, turn_number)? {
                return Ok(VoteOutcome::Rejected(conflict));
            }
            let db_turn = to_db_turn(turn_number)?;

            let already: i64 = votes::table
                .filter(votes::game_id.eq(game_id))
                .filter(votes::turn_number.eq(db_turn))
                .filter(votes::voter_id.eq(voter_id))
                .count()
                .get_result(conn)?;
            if already > 0 {
                return Ok(VoteOutcome::Rejected(Conflict::DuplicateVote));
            }

            let updated = diesel::update(
                candidates::table
                    .filter(candidates::id.eq(candidate_id))
                    .filter(candidates::game_id.eq(game_id))
                    .filter(candidates::turn_number.eq(db_turn)),
            )
            .set(candidates::vote_count.eq(candidates::vote_count + 1))
            .execute(conn)?;
            if updated == 0 {
                return Ok(VoteOutcome::Rejected(Conflict::UnknownCandidate));
            }

            // The primary key on (game, turn, voter) rejects a second insert,
            // which rolls the increment back with it.
            diesel::insert_into(votes::table)
                .values(NewVote::new(
                    game_id.to_string(),
                    db_turn,
                    voter_id.to_string(),
                    candidate_id.to_string(),
                    now().naive_utc(),
                ))
                .execute(conn)?;

            let vote_count: i32 = candidates::table
                .find(candidate_id)
                .select(candidates::vote_count)
                .first(conn)?;
            let vote_count =
                u32::try_from(vote_count).map_err(|_| StoreError::new("negative vote count"))?;
            Ok(VoteOutcome::Counted { vote_count })
        })
    }

    #[instrument(skip(self, board))]
    fn advance_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
        board: Board,
        winner: Option<Winner>,
    ) -> Result<AdvanceOutcome, StoreError> {
        use schema::games::dsl;

        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            let Some(row) = dsl::games
                .find(game_id)
                .first::<GameRow>(conn)
                .optional()?
            else {
                return Ok(AdvanceOutcome::Rejected(Conflict::GameNotFound));
            };
            let game = row.into_game()?;

            if *game.turn_number() != expected_turn {
                return Ok(AdvanceOutcome::Rejected(Conflict::StaleTurn {
                    current: *game.turn_number(),
                }));
            }
            if game.is_finished() {
                return Ok(AdvanceOutcome::Rejected(Conflict::GameFinished));
            }

            let next = game.advanced(board, winner);
            let updated = diesel::update(
                dsl::games
                    .filter(dsl::id.eq(game_id))
                    .filter(dsl::turn_number.eq(to_db_turn(expected_turn)?)),
            )
            .set((
                dsl::turn_number.eq(to_db_turn(*next.turn_number())?),
                dsl::board.eq(next.board().encode()),
                dsl::status.eq(next.status().to_string()),
                dsl::winner.eq(next.winner().map(|w| w.to_string())),
                dsl::updated_at.eq(next.updated_at().naive_utc()),
            ))
            .execute(conn)?;

            if updated == 0 {
                warn!("Turn guard matched no row");
                return Ok(AdvanceOutcome::Rejected(Conflict::StaleTurn {
                    current: expected_turn + 1,
                }));
            }
            Ok(AdvanceOutcome::Advanced(next))
        })
    }

    #[instrument(skip(self))]
    fn resolve_collective_turn(
        &self,
        game_id: &str,
        expected_turn: u32,
    ) -> Result<ResolveOutcome, StoreError> {
        use schema::{candidates, games};

        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            let Some(row) = games::table
                .find(game_id)
                .first::<GameRow>(conn)
                .optional()?
            else {
                return Ok(ResolveOutcome::Rejected(Conflict::GameNotFound));
            };
            let game = row.into_game()?;

            if *game.turn_number() != expected_turn {
                return Ok(ResolveOutcome::Rejected(Conflict::StaleTurn {
                    current: *game.turn_number(),
                }));
            }
            if game.is_finished() {
                return Ok(ResolveOutcome::Rejected(Conflict::GameFinished));
            }

            let db_turn = to_db_turn(expected_turn)?;
            let tally = candidates::table
                .filter(candidates::game_id.eq(game_id))
                .filter(candidates::turn_number.eq(db_turn))
                .order(candidates::sequence.asc())
                .load::<CandidateRow>(conn)?
                .into_iter()
                .map(CandidateRow::into_candidate)
                .collect::<Result<Vec<_>, _>>()?;
            let applied = leading(&tally).cloned();
            let board = applied
                .as_ref()
                .map_or(*game.board(), |leader| *leader.resulting_board());

            let next = game.advanced(board, game.winner_after(&board));
            let updated = diesel::update(
                games::table
                    .filter(games::id.eq(game_id))
                    .filter(games::turn_number.eq(db_turn)),
            )
            .set((
                games::turn_number.eq(to_db_turn(*next.turn_number())?),
                games::board.eq(next.board().encode()),
                games::status.eq(next.status().to_string()),
                games::winner.eq(next.winner().map(|w| w.to_string())),
                games::updated_at.eq(next.updated_at().naive_utc()),
            ))
            .execute(conn)?;

            if updated == 0 {
                warn!("Turn guard matched no row");
                return Ok(ResolveOutcome::Rejected(Conflict::StaleTurn {
                    current: expected_turn + 1,
                }));
            }
            debug!(candidates = tally.len(), applied = applied.is_some(), "Collective turn closed");
            Ok(ResolveOutcome::Resolved {
                game: next,
                applied,
            })
        })
    }
}

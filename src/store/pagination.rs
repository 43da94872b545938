//! Cursor-based pagination for game listings.
//!
//! Games are listed newest first, ordered by `(created_at DESC, id DESC)`.
//! A cursor marks the last item of a page; the next page starts strictly
//! after it, so a static data set is covered exactly once.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::Serialize;
use std::str::FromStr;
use tracing::instrument;

use super::models::{Game, GameId};

/// Opaque position in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Cursor {
    created_at: DateTime<Utc>,
    game_id: GameId,
}

impl Cursor {
    /// Cursor pointing just past `game`.
    #[instrument(skip(game), fields(game_id = %game.id()))]
    pub fn after(game: &Game) -> Self {
        Self {
            created_at: *game.created_at(),
            game_id: game.id().clone(),
        }
    }

    /// Checks if `game` sorts strictly after this cursor.
    pub fn admits(&self, game: &Game) -> bool {
        match game.created_at().cmp(&self.created_at) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => game.id() < &self.game_id,
            std::cmp::Ordering::Greater => false,
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let raw = format!("{}|{}", self.created_at.timestamp_micros(), self.game_id);
        for byte in raw.bytes() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Error returned for a cursor this store did not issue.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Invalid cursor: {reason}")]
pub struct CursorError {
    /// Why the cursor was rejected.
    pub reason: String,
}

impl CursorError {
    fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() % 2 != 0 || !s.is_ascii() {
            return Err(CursorError::new("malformed encoding"));
        }
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| CursorError::new("malformed encoding"))?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError::new("malformed encoding"))?;

        let (micros, game_id) = raw
            .split_once('|')
            .ok_or_else(|| CursorError::new("missing separator"))?;
        let micros = micros
            .parse::<i64>()
            .map_err(|_| CursorError::new("bad timestamp"))?;
        let created_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| CursorError::new("timestamp out of range"))?;

        if game_id.is_empty() {
            return Err(CursorError::new("missing game id"));
        }

        Ok(Self {
            created_at,
            game_id: game_id.to_string(),
        })
    }
}

/// Page size and starting point for a listing.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct PageRequest {
    limit: usize,
    cursor: Option<Cursor>,
}

impl PageRequest {
    /// Creates a request. A zero limit is raised to one.
    pub fn new(limit: usize, cursor: Option<Cursor>) -> Self {
        Self {
            limit: limit.max(1),
            cursor,
        }
    }

    /// First page with the given limit.
    pub fn first(limit: usize) -> Self {
        Self::new(limit, None)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Getters)]
pub struct Page<T> {
    items: Vec<T>,
    #[serde(serialize_with = "serialize_cursor")]
    next_cursor: Option<Cursor>,
}

fn serialize_cursor<S: serde::Serializer>(
    cursor: &Option<Cursor>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match cursor {
        Some(cursor) => serializer.serialize_some(&cursor.to_string()),
        None => serializer.serialize_none(),
    }
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    /// Splits the page into items and continuation cursor.
    pub fn into_parts(self) -> (Vec<T>, Option<Cursor>) {
        (self.items, self.next_cursor)
    }
}

/// Sorts `games` into listing order and cuts the page `request` asks for.
pub(crate) fn paginate(mut games: Vec<Game>, request: &PageRequest) -> Page<Game> {
    games.sort_by(|a, b| {
        b.created_at()
            .cmp(a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });

    let mut items: Vec<Game> = games
        .into_iter()
        .filter(|game| request.cursor().as_ref().is_none_or(|c| c.admits(game)))
        .take(request.limit() + 1)
        .collect();

    let next_cursor = if items.len() > *request.limit() {
        items.truncate(*request.limit());
        items.last().map(Cursor::after)
    } else {
        None
    };

    Page::new(items, next_cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::othello::Side;

    #[test]
    fn test_cursor_text_form_parses_back() {
        let game = Game::new(Side::Black);
        let cursor = Cursor::after(&game);
        let parsed: Cursor = cursor.to_string().parse().unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        assert!("zz".parse::<Cursor>().is_err());
        assert!("abc".parse::<Cursor>().is_err());
        assert!("".parse::<Cursor>().is_err());
    }

    #[test]
    fn test_paginate_covers_every_game_once() {
        let games: Vec<_> = (0..7).map(|_| Game::new(Side::White)).collect();
        let mut seen = Vec::new();
        let mut request = PageRequest::first(3);
        let mut pages = 0;

        loop {
            let (items, next) = paginate(games.clone(), &request).into_parts();
            pages += 1;
            seen.extend(items.into_iter().map(|g| g.id().clone()));
            match next {
                Some(cursor) => request = PageRequest::new(3, Some(cursor)),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }
}

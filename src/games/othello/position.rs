//! Board coordinates and scan directions.

use derive_more::{Display, Error};
use serde::Serialize;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::instrument;

/// Width and height of the board.
pub const BOARD_SIZE: usize = 8;

/// A cell on the 8x8 board, addressed by zero-based `(row, col)`.
///
/// Row 0 is the top of the board. The algebraic label uses a column
/// letter and a one-based row number, so `(3, 4)` is `e4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    /// Creates a position, returning `None` when either coordinate is off the board.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// Zero-based row.
    pub fn row(self) -> usize {
        self.row as usize
    }

    /// Zero-based column.
    pub fn col(self) -> usize {
        self.col as usize
    }

    /// Row-major index (0-63).
    pub fn index(self) -> usize {
        self.row() * BOARD_SIZE + self.col()
    }

    /// Creates a position from a row-major index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::new(index / BOARD_SIZE, index % BOARD_SIZE)
    }

    /// All 64 positions in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE * BOARD_SIZE).filter_map(Self::from_index)
    }

    /// The neighbouring position one step in `direction`, if it is on the board.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dr, dc) = direction.delta();
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if row < 0 || col < 0 {
            return None;
        }
        Self::new(row as usize, col as usize)
    }

    /// Algebraic label such as `d3`.
    pub fn label(self) -> String {
        format!("{}{}", (b'a' + self.col) as char, self.row + 1)
    }

    /// Parses an algebraic label (`d3`) or a `row,col` pair (`2,3`).
    #[instrument]
    pub fn parse(s: &str) -> Option<Position> {
        let s = s.trim();

        if let Some((row, col)) = s.split_once(',') {
            let row = row.trim().parse::<usize>().ok()?;
            let col = col.trim().parse::<usize>().ok()?;
            return Self::new(row, col);
        }

        let mut chars = s.chars();
        let letter = chars.next()?.to_ascii_lowercase();
        if !letter.is_ascii_lowercase() {
            return None;
        }
        let row = chars.as_str().parse::<usize>().ok()?.checked_sub(1)?;
        Self::new(row, (letter as u8 - b'a') as usize)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error returned when a position string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Invalid position '{input}' (expected a label like d3 or a pair like 2,3)")]
pub struct PositionParseError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| PositionParseError {
            input: s.to_string(),
        })
    }
}

/// One of the eight directions a capture run can extend in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
pub enum Direction {
    /// Towards row 0.
    North,
    /// Up and right.
    NorthEast,
    /// Towards column 7.
    East,
    /// Down and right.
    SouthEast,
    /// Towards row 7.
    South,
    /// Down and left.
    SouthWest,
    /// Towards column 0.
    West,
    /// Up and left.
    NorthWest,
}

impl Direction {
    /// `(row, col)` offset of a single step.
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::North => (-1, 0),
            Direction::NorthEast => (-1, 1),
            Direction::East => (0, 1),
            Direction::SouthEast => (1, 1),
            Direction::South => (1, 0),
            Direction::SouthWest => (1, -1),
            Direction::West => (0, -1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// All eight directions.
    pub fn all() -> impl Iterator<Item = Direction> {
        Direction::iter()
    }
}

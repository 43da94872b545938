//! Core domain types for Othello.

use super::position::{BOARD_SIZE, Position};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Disk colour. Black always opens the game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Side {
    /// Black disks.
    Black,
    /// White disks.
    White,
}

impl Side {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    fn symbol(self) -> char {
        match self {
            Side::Black => 'B',
            Side::White => 'W',
        }
    }
}

/// A single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// No disk.
    Empty,
    /// Holds a disk of the given side.
    Occupied(Side),
}

impl Cell {
    fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Occupied(side) => side.symbol(),
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            '.' => Some(Cell::Empty),
            'B' | 'b' => Some(Cell::Occupied(Side::Black)),
            'W' | 'w' => Some(Cell::Occupied(Side::White)),
            _ => None,
        }
    }
}

/// 8x8 Othello board.
///
/// Boards are values: applying a move produces a new board and leaves
/// the original untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Cells indexed `[row][col]`.
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates a board with no disks.
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Creates the standard opening position.
    ///
    /// White on (3,3) and (4,4), Black on (3,4) and (4,3).
    pub fn initial() -> Self {
        let mut board = Self::empty();
        board.cells[3][3] = Cell::Occupied(Side::White);
        board.cells[3][4] = Cell::Occupied(Side::Black);
        board.cells[4][3] = Cell::Occupied(Side::Black);
        board.cells[4][4] = Cell::Occupied(Side::White);
        board
    }

    /// Gets the cell at the given position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row()][pos.col()]
    }

    /// Returns a copy of this board with one cell replaced.
    pub fn with(&self, pos: Position, cell: Cell) -> Self {
        let mut next = *self;
        next.set(pos, cell);
        next
    }

    pub(super) fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row()][pos.col()] = cell;
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> &[[Cell; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// Number of disks belonging to `side`.
    pub fn count(&self, side: Side) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| **c == Cell::Occupied(side))
            .count()
    }

    /// Number of empty cells.
    pub fn empty_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| **c == Cell::Empty)
            .count()
    }

    /// Checks if every cell holds a disk.
    pub fn is_full(&self) -> bool {
        self.empty_count() == 0
    }

    /// Formats the board as a labelled text grid.
    pub fn display(&self) -> String {
        let mut result = String::from("  a b c d e f g h\n");
        for (row, cells) in self.rows().iter().enumerate() {
            result.push_str(&(row + 1).to_string());
            for cell in cells {
                result.push(' ');
                result.push(cell.symbol());
            }
            if row + 1 < BOARD_SIZE {
                result.push('\n');
            }
        }
        result
    }

    /// Encodes the board as 64 row-major symbols (`.`, `B`, `W`).
    pub fn encode(&self) -> String {
        self.cells.iter().flatten().map(|c| c.symbol()).collect()
    }

    /// Parses 64 row-major symbols, ignoring whitespace.
    ///
    /// Accepts the output of [`Board::encode`] as well as multi-line
    /// fixtures with one row per line.
    ///
    /// # Errors
    ///
    /// Returns [`BoardParseError`] on unknown symbols or a cell count other than 64.
    pub fn parse(text: &str) -> Result<Self, BoardParseError> {
        let mut board = Self::empty();
        let mut count = 0;

        for c in text.chars().filter(|c| !c.is_whitespace()) {
            let cell = Cell::from_symbol(c).ok_or_else(|| BoardParseError {
                message: format!("unknown cell symbol '{}'", c),
            })?;
            let pos = Position::from_index(count).ok_or_else(|| BoardParseError {
                message: "more than 64 cells".to_string(),
            })?;
            board.set(pos, cell);
            count += 1;
        }

        if count != BOARD_SIZE * BOARD_SIZE {
            return Err(BoardParseError {
                message: format!("expected 64 cells, found {}", count),
            });
        }

        Ok(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl FromStr for Board {
    type Err = BoardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error returned when decoding a board fails.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Invalid board: {message}")]
pub struct BoardParseError {
    /// What was wrong with the input.
    pub message: String,
}

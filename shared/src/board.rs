//! Board geometry: cells, sides, positions and the fixed 8x8 grid.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of the board
pub const BOARD_SIZE: i32 = 8;

/// One of the two players. White always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    White,
    Black,
}

impl From<Side> for Cell {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Cell::White,
            Side::Black => Cell::Black,
        }
    }
}

/// Unit step on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub row_step: i32,
    pub col_step: i32,
}

/// The eight king-move directions
pub const DIRECTIONS: [Direction; 8] = [
    Direction { row_step: 1, col_step: 1 },
    Direction { row_step: 1, col_step: 0 },
    Direction { row_step: 1, col_step: -1 },
    Direction { row_step: 0, col_step: 1 },
    Direction { row_step: 0, col_step: -1 },
    Direction { row_step: -1, col_step: 1 },
    Direction { row_step: -1, col_step: 0 },
    Direction { row_step: -1, col_step: -1 },
];

/// A (row, col) pair. Coordinates are signed so that clients can send
/// anything; only positions inside `[0, BOARD_SIZE)` are on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn is_on_board(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.row) && (0..BOARD_SIZE).contains(&self.col)
    }

    pub fn step(self, direction: Direction) -> Position {
        Position {
            row: self.row + direction.row_step,
            col: self.col + direction.col_step,
        }
    }

    /// Iterates every position on the board in row-major order
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Position { row, col }))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Fixed 8x8 grid of cells
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE as usize]; BOARD_SIZE as usize],
        }
    }

    /// Standard opening: the four center cells in alternating colors
    pub fn initial() -> Self {
        let mut board = Self::empty();
        let high = BOARD_SIZE / 2;
        let low = high - 1;

        board.set(Position::new(low, low), Cell::White);
        board.set(Position::new(low, high), Cell::Black);
        board.set(Position::new(high, low), Cell::Black);
        board.set(Position::new(high, high), Cell::White);
        board
    }

    pub fn from_rows(cells: [[Cell; BOARD_SIZE as usize]; BOARD_SIZE as usize]) -> Self {
        Self { cells }
    }

    /// Returns None for positions off the board
    pub fn get(&self, pos: Position) -> Option<Cell> {
        if !pos.is_on_board() {
            return None;
        }
        Some(self.cells[pos.row as usize][pos.col as usize])
    }

    /// Writes a cell. Positions off the board are ignored.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if pos.is_on_board() {
            self.cells[pos.row as usize][pos.col as usize] = cell;
        }
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|&&c| c == cell)
            .count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for cell in row {
                let c = match cell {
                    Cell::Empty => '.',
                    Cell::White => 'W',
                    Cell::Black => 'B',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

//! Reversi rules: move validation, disc flipping and terminal-state detection.
//!
//! A move is legal when, in at least one of the eight directions, the cells
//! adjacent to the target form a non-empty run of opponent discs that ends on
//! one of the mover's own discs. Every run closed that way is flipped.
//!
//! The game ends as soon as the side to move has no legal move. There is no
//! pass rule.

use crate::board::{Board, Cell, Direction, Position, Side, DIRECTIONS};
use thiserror::Error;

/// Why a move was refused. The game is left untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("position {0} is outside the board")]
    OutOfBounds(Position),
    #[error("cell {0} is already occupied")]
    Occupied(Position),
    #[error("move at {0} captures nothing")]
    NoCapture(Position),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    board: Board,
    side_to_move: Side,
}

impl Game {
    /// Standard opening with white to move
    pub fn new() -> Self {
        Self::from_parts(Board::initial(), Side::White)
    }

    pub fn from_parts(board: Board, side_to_move: Side) -> Self {
        Self {
            board,
            side_to_move,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// Plays a disc for the side to move.
    ///
    /// On success the captured runs are flipped, the turn passes to the other
    /// side and the number of flipped discs is returned.
    pub fn make_turn(&mut self, pos: Position) -> Result<usize, MoveError> {
        match self.board.get(pos) {
            None => return Err(MoveError::OutOfBounds(pos)),
            Some(Cell::Empty) => {}
            Some(_) => return Err(MoveError::Occupied(pos)),
        }

        let lines: Vec<(Direction, Position)> = DIRECTIONS
            .iter()
            .filter_map(|&direction| {
                self.capture_anchor(pos, direction)
                    .map(|anchor| (direction, anchor))
            })
            .collect();

        if lines.is_empty() {
            return Err(MoveError::NoCapture(pos));
        }

        let own = Cell::from(self.side_to_move);
        let mut flipped = 0;
        self.board.set(pos, own);

        for (direction, anchor) in lines {
            let mut cursor = pos.step(direction);
            while cursor != anchor {
                self.board.set(cursor, own);
                flipped += 1;
                cursor = cursor.step(direction);
            }
        }

        self.side_to_move = self.side_to_move.opposite();
        Ok(flipped)
    }

    /// True when the side to move has no legal move anywhere on the board
    pub fn is_finished(&self) -> bool {
        !Position::all().any(|pos| self.can_play(pos))
    }

    /// Every legal move for the side to move, in row-major order
    pub fn legal_moves(&self) -> Vec<Position> {
        Position::all().filter(|&pos| self.can_play(pos)).collect()
    }

    /// Disc counts as (white, black)
    pub fn score(&self) -> (usize, usize) {
        (self.board.count(Cell::White), self.board.count(Cell::Black))
    }

    fn can_play(&self, pos: Position) -> bool {
        self.board.get(pos) == Some(Cell::Empty)
            && DIRECTIONS
                .iter()
                .any(|&direction| self.capture_anchor(pos, direction).is_some())
    }

    /// Walks from `pos` over opponent discs and returns the closing own disc,
    /// if the run is non-empty and stays on the board.
    fn capture_anchor(&self, pos: Position, direction: Direction) -> Option<Position> {
        let own = Cell::from(self.side_to_move);
        let opponent = Cell::from(self.side_to_move.opposite());

        let mut cursor = pos.step(direction);
        let mut moved = false;
        while self.board.get(cursor) == Some(opponent) {
            cursor = cursor.step(direction);
            moved = true;
        }

        if moved && self.board.get(cursor) == Some(own) {
            Some(cursor)
        } else {
            None
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

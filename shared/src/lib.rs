//! Game rules and wire protocol shared by the Reversi server and client.

pub mod board;
pub mod game;
pub mod protocol;

pub use board::{Board, Cell, Direction, Position, Side, BOARD_SIZE, DIRECTIONS};
pub use game::{Game, MoveError};
pub use protocol::{ParseError, Request, Response, SessionId};

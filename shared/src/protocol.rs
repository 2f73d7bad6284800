//! Request/response messages exchanged between clients and the server.
//!
//! Every message has a text form (whitespace-delimited, one command per
//! WebSocket text frame) and a binary form (bincode, one message per binary
//! frame). Both forms describe the same enums.

use crate::board::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server-assigned game identifier
pub type SessionId = u64;

/// Commands a client can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Create,
    Connect {
        session_id: SessionId,
    },
    Turn {
        session_id: SessionId,
        position: Position,
    },
}

/// Messages the server addresses to a single connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    SessionCreated { session_id: SessionId },
    Connected { session_id: SessionId },
    GameStarted,
    MoveAccepted,
    MoveRejected,
    OpponentMoved { position: Position },
    Error { reason: String },
    Quit,
}

/// Malformed text message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{command}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        command: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid integer '{text}' for {field}")]
    InvalidInteger { field: &'static str, text: String },
}

fn expect_args(
    command: &'static str,
    args: &[&str],
    expected: usize,
) -> Result<(), ParseError> {
    if args.len() != expected {
        return Err(ParseError::ArgumentCount {
            command,
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn parse_int<T: FromStr>(field: &'static str, text: &str) -> Result<T, ParseError> {
    text.parse().map_err(|_| ParseError::InvalidInteger {
        field,
        text: text.to_string(),
    })
}

impl Request {
    /// Parses the text grammar: `create`, `connect <id>`, `turn <id> <row> <col>`
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut words = raw.split_whitespace();
        let command = words.next().ok_or(ParseError::Empty)?;
        let args: Vec<&str> = words.collect();

        match command {
            "create" => {
                expect_args("create", &args, 0)?;
                Ok(Request::Create)
            }
            "connect" => {
                expect_args("connect", &args, 1)?;
                Ok(Request::Connect {
                    session_id: parse_int("session id", args[0])?,
                })
            }
            "turn" => {
                expect_args("turn", &args, 3)?;
                Ok(Request::Turn {
                    session_id: parse_int("session id", args[0])?,
                    position: Position::new(parse_int("row", args[1])?, parse_int("col", args[2])?),
                })
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(data)
    }
}

impl FromStr for Request {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Request::parse(s)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Create => write!(f, "create"),
            Request::Connect { session_id } => write!(f, "connect {}", session_id),
            Request::Turn {
                session_id,
                position,
            } => write!(f, "turn {} {} {}", session_id, position.row, position.col),
        }
    }
}

impl Response {
    pub fn error(reason: impl Into<String>) -> Self {
        Response::Error {
            reason: reason.into(),
        }
    }

    /// Parses the server's text encoding back into a response
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        let (command, rest) = match raw.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (raw, ""),
        };
        if command.is_empty() {
            return Err(ParseError::Empty);
        }

        // The error reason is free text and keeps its inner whitespace
        if command == "error" {
            return Ok(Response::error(rest));
        }

        let args: Vec<&str> = rest.split_whitespace().collect();
        match command {
            "created" => {
                expect_args("created", &args, 1)?;
                Ok(Response::SessionCreated {
                    session_id: parse_int("session id", args[0])?,
                })
            }
            "connected" => {
                expect_args("connected", &args, 1)?;
                Ok(Response::Connected {
                    session_id: parse_int("session id", args[0])?,
                })
            }
            "start" => {
                expect_args("start", &args, 0)?;
                Ok(Response::GameStarted)
            }
            "ok" => {
                expect_args("ok", &args, 0)?;
                Ok(Response::MoveAccepted)
            }
            "fail" => {
                expect_args("fail", &args, 0)?;
                Ok(Response::MoveRejected)
            }
            "turn" => {
                expect_args("turn", &args, 2)?;
                Ok(Response::OpponentMoved {
                    position: Position::new(parse_int("row", args[0])?, parse_int("col", args[1])?),
                })
            }
            "quit" => {
                expect_args("quit", &args, 0)?;
                Ok(Response::Quit)
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(data)
    }
}

impl FromStr for Response {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Response::parse(s)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::SessionCreated { session_id } => write!(f, "created {}", session_id),
            Response::Connected { session_id } => write!(f, "connected {}", session_id),
            Response::GameStarted => write!(f, "start"),
            Response::MoveAccepted => write!(f, "ok"),
            Response::MoveRejected => write!(f, "fail"),
            Response::OpponentMoved { position } => {
                write!(f, "turn {} {}", position.row, position.col)
            }
            Response::Error { reason } => write!(f, "error {}", reason),
            Response::Quit => write!(f, "quit"),
        }
    }
}

//! Two-player session wrapping one game.
//!
//! The first participant plays white, the second black. A session starts in
//! `AwaitingOpponent` and becomes `Active` once a different participant joins;
//! after that only the participant whose side is to move may play.

use crate::identity::Participant;
use shared::{Game, MoveError, Position, SessionId, Side};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingOpponent,
    Active,
}

/// Rule-level refusals. None of them change the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("game already has two players")]
    AlreadyStarted,
    #[error("cannot join your own game")]
    SelfConnect,
    #[error("game has not started")]
    NotStarted,
    #[error("not your turn")]
    NotYourTurn,
    #[error(transparent)]
    IllegalMove(#[from] MoveError),
}

#[derive(Debug, Clone)]
pub struct Session<P> {
    id: SessionId,
    game: Game,
    state: SessionState,
    white: P,
    /// Set exactly when the session is active
    black: Option<P>,
}

impl<P: Participant> Session<P> {
    pub fn new(id: SessionId, white: P) -> Self {
        Self::with_game(id, Game::new(), white)
    }

    pub fn with_game(id: SessionId, game: Game, white: P) -> Self {
        Self {
            id,
            game,
            state: SessionState::AwaitingOpponent,
            white,
            black: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn white(&self) -> &P {
        &self.white
    }

    pub fn black(&self) -> Option<&P> {
        self.black.as_ref()
    }

    /// Seats the second participant and starts the game
    pub fn try_connect(&mut self, participant: P) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingOpponent {
            return Err(SessionError::AlreadyStarted);
        }
        if participant == self.white {
            return Err(SessionError::SelfConnect);
        }

        self.black = Some(participant);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Plays a move on behalf of `participant`, returning the number of
    /// flipped discs.
    pub fn submit_move(&mut self, participant: &P, pos: Position) -> Result<usize, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotStarted);
        }
        if self.side_of(participant) != Some(self.game.side_to_move()) {
            return Err(SessionError::NotYourTurn);
        }

        Ok(self.game.make_turn(pos)?)
    }

    pub fn side_of(&self, participant: &P) -> Option<Side> {
        if *participant == self.white {
            Some(Side::White)
        } else if self.black.as_ref() == Some(participant) {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// The other seated participant, if any
    pub fn opponent_of(&self, participant: &P) -> Option<&P> {
        match self.side_of(participant)? {
            Side::White => self.black.as_ref(),
            Side::Black => Some(&self.white),
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &P> {
        std::iter::once(&self.white).chain(self.black.iter())
    }
}

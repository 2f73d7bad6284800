//! Secret-key identities.
//!
//! Instead of tying a seat to a live connection, each player receives a random
//! key when creating or joining a game and presents it with every move. A
//! player can therefore continue from a new connection as long as it keeps the
//! key. The lobby is the same registry keyed by [`PlayerKey`].

use crate::registry::{MoveOutcome, Registry, RegistryError};
use crate::session::SessionError;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{Position, SessionId};
use std::fmt;

pub const KEY_LENGTH: usize = 32;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn generate() -> Self {
        let key = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(KEY_LENGTH)
            .map(char::from)
            .collect();
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

// Keys end up in registry log lines
impl fmt::Debug for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "PlayerKey({}..)", prefix)
    }
}

/// What a player needs to keep in order to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session_id: SessionId,
    pub key: PlayerKey,
}

pub struct KeyedLobby {
    registry: Registry<PlayerKey>,
}

impl KeyedLobby {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry<PlayerKey> {
        &self.registry
    }

    /// Opens a game and returns the white player's credentials
    pub fn create_game(&self) -> Credentials {
        loop {
            let key = PlayerKey::generate();
            match self.registry.create_game(key.clone()) {
                Ok(session_id) => return Credentials { session_id, key },
                // Drew a key that is already seated
                Err(e) => debug!("Regenerating key for new game: {}", e),
            }
        }
    }

    /// Joins an awaiting game as black
    pub fn connect(&self, session_id: SessionId) -> Result<Credentials, RegistryError> {
        loop {
            let key = PlayerKey::generate();
            match self.registry.connect_to_game(key.clone(), session_id) {
                Ok(_) => return Ok(Credentials { session_id, key }),
                // Drew white's key
                Err(RegistryError::Session(SessionError::SelfConnect)) => {
                    debug!("Regenerating key for session {}", session_id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn make_turn(
        &self,
        session_id: SessionId,
        key: &PlayerKey,
        pos: Position,
    ) -> Result<MoveOutcome<PlayerKey>, RegistryError> {
        self.registry.submit_move(key, session_id, pos)
    }
}

impl Default for KeyedLobby {
    fn default() -> Self {
        Self::new()
    }
}

//! Request dispatch on top of the registry.
//!
//! The handler turns one inbound request into a list of addressed responses.
//! It holds no per-connection state and never touches the network, so every
//! flow can be exercised directly in tests.

use crate::identity::Participant;
use crate::registry::{Registry, RegistryError};
use log::{debug, error, warn};
use shared::{Request, Response};

pub const SESSION_NOT_FOUND: &str = "game session not found";
pub const CONNECT_FAILED: &str = "unable to connect to game";
pub const ALREADY_IN_GAME: &str = "already playing in another game";

/// One response addressed to one participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action<P> {
    pub recipient: P,
    pub response: Response,
}

impl<P> Action<P> {
    pub fn new(recipient: P, response: Response) -> Self {
        Self {
            recipient,
            response,
        }
    }
}

pub struct Handler<P> {
    registry: Registry<P>,
}

impl<P: Participant> Handler<P> {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    /// Parses a text request from `sender` and dispatches it
    pub fn handle_request(&self, sender: &P, raw: &str) -> Vec<Action<P>> {
        match Request::parse(raw) {
            Ok(request) => self.dispatch(sender, request),
            Err(e) => {
                debug!("Unparseable request from {:?}: {}", sender, e);
                vec![Action::new(sender.clone(), Response::error(e.to_string()))]
            }
        }
    }

    pub fn dispatch(&self, sender: &P, request: Request) -> Vec<Action<P>> {
        debug!("{:?} -> {}", sender, request);

        match request {
            Request::Create => match self.registry.create_game(sender.clone()) {
                Ok(session_id) => vec![Action::new(
                    sender.clone(),
                    Response::SessionCreated { session_id },
                )],
                Err(e) => {
                    debug!("{:?} cannot create a game: {}", sender, e);
                    vec![Action::new(sender.clone(), Response::error(ALREADY_IN_GAME))]
                }
            },
            Request::Connect { session_id } => {
                match self.registry.connect_to_game(sender.clone(), session_id) {
                    Ok(view) => {
                        let mut actions = vec![Action::new(
                            sender.clone(),
                            Response::Connected { session_id },
                        )];
                        match view.opponent_of(sender) {
                            Some(opponent) => {
                                actions.push(Action::new(opponent.clone(), Response::GameStarted))
                            }
                            None => error!(
                                "Session {} active without an opponent for {:?}",
                                session_id,
                                sender
                            ),
                        }
                        actions
                    }
                    Err(RegistryError::AlreadySeated(current)) => {
                        debug!(
                            "{:?} tried to join session {} while in session {}",
                            sender, session_id, current
                        );
                        vec![Action::new(sender.clone(), Response::error(ALREADY_IN_GAME))]
                    }
                    Err(e) => {
                        debug!("{:?} failed to join session {}: {}", sender, session_id, e);
                        vec![Action::new(sender.clone(), Response::error(CONNECT_FAILED))]
                    }
                }
            }
            Request::Turn {
                session_id,
                position,
            } => match self.registry.submit_move(sender, session_id, position) {
                Ok(outcome) => vec![
                    Action::new(sender.clone(), Response::MoveAccepted),
                    Action::new(outcome.opponent, Response::OpponentMoved { position }),
                ],
                Err(RegistryError::NotFound(_)) => {
                    vec![Action::new(sender.clone(), Response::error(SESSION_NOT_FOUND))]
                }
                Err(e) => {
                    debug!("{:?} move {} rejected: {}", sender, position, e);
                    vec![Action::new(sender.clone(), Response::MoveRejected)]
                }
            },
        }
    }

    /// Tears down whatever session `participant` was in after its transport
    /// failed. Produces nothing if it had no session.
    pub fn handle_disconnect(&self, participant: &P) -> Vec<Action<P>> {
        let Some(view) = self.registry.find_by_participant(participant) else {
            return Vec::new();
        };

        let actions = view
            .participants()
            .filter(|p| *p != participant)
            .map(|p| Action::new(p.clone(), Response::Quit))
            .collect();

        if self.registry.remove_session(view.id) {
            warn!(
                "Session {} closed after {:?} disconnected",
                view.id, participant
            );
        }
        actions
    }
}

impl<P: Participant> Default for Handler<P> {
    fn default() -> Self {
        Self::new()
    }
}

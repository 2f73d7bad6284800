//! Concurrent store of all live sessions.
//!
//! ## Locking discipline
//!
//! The registry keeps two indices behind one table lock: session id to session,
//! and participant to the session id it currently plays in. Each session sits
//! behind its own mutex. A participant is seated in at most one live session;
//! `create_game` and `connect_to_game` refuse anyone who already is.
//!
//! - Lookups take the table lock shared, clone the session handle and release
//!   the table before locking the session.
//! - `create_game`, `connect_to_game` and `remove_session` take the table lock
//!   exclusively, so a session and its participant entries appear and
//!   disappear together.
//! - `submit_move` holds only the session mutex while the move is applied. A
//!   move that finishes the game removes the session in two steps: it sets the
//!   `retired` flag before releasing the session mutex, then unlinks the
//!   session from both indices under the exclusive table lock.
//!
//! The `retired` flag is what makes those two steps look atomic to callers.
//! Every operation checks it under the session mutex and treats a retired
//! session exactly like a missing one, so nothing can observe or act on a
//! finished game while its index entries are still being unlinked.
//!
//! Locks are always acquired table first, session second, so moves in
//! different sessions never wait on each other.

use crate::identity::Participant;
use crate::session::{Session, SessionError, SessionState};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use shared::{Board, Position, SessionId, Side};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("game session {0} not found")]
    NotFound(SessionId),
    #[error("already playing in game session {0}")]
    AlreadySeated(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Point-in-time copy of a session, safe to hold without any lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView<P> {
    pub id: SessionId,
    pub state: SessionState,
    pub white: P,
    pub black: Option<P>,
    pub side_to_move: Side,
    pub board: Board,
}

impl<P: Participant> SessionView<P> {
    fn of(session: &Session<P>) -> Self {
        Self {
            id: session.id(),
            state: session.state(),
            white: session.white().clone(),
            black: session.black().cloned(),
            side_to_move: session.game().side_to_move(),
            board: session.game().board().clone(),
        }
    }

    pub fn opponent_of(&self, participant: &P) -> Option<&P> {
        if *participant == self.white {
            self.black.as_ref()
        } else if self.black.as_ref() == Some(participant) {
            Some(&self.white)
        } else {
            None
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &P> {
        std::iter::once(&self.white).chain(self.black.iter())
    }
}

/// Result of an accepted move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome<P> {
    pub session_id: SessionId,
    /// Participant to notify about the move
    pub opponent: P,
    pub flipped: usize,
    /// The game ended with this move and the session has been removed
    pub finished: bool,
}

struct Slot<P> {
    session: Session<P>,
    retired: bool,
}

type SlotHandle<P> = Arc<Mutex<Slot<P>>>;

struct Tables<P> {
    sessions: HashMap<SessionId, SlotHandle<P>>,
    participants: HashMap<P, SessionId>,
    next_session_id: SessionId,
}

impl<P: Participant> Tables<P> {
    /// Live session `participant` is seated in. Entries pointing at a retired
    /// session are stale and do not count.
    fn seated_in(&self, participant: &P) -> Option<SessionId> {
        let session_id = *self.participants.get(participant)?;
        let slot = self.sessions.get(&session_id)?.lock();
        (!slot.retired).then_some(session_id)
    }

    /// Drops participant entries that still point at `session_id`
    fn unlink(&mut self, session_id: SessionId, participants: &[P]) {
        for participant in participants {
            if self.participants.get(participant) == Some(&session_id) {
                self.participants.remove(participant);
            }
        }
    }
}

pub struct Registry<P> {
    tables: RwLock<Tables<P>>,
}

impl<P: Participant> Registry<P> {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                sessions: HashMap::new(),
                participants: HashMap::new(),
                next_session_id: 0,
            }),
        }
    }

    /// Opens a new session with `participant` as white. Ids start at 0 and are
    /// never reused. Fails if `participant` is already seated elsewhere.
    pub fn create_game(&self, participant: P) -> Result<SessionId, RegistryError> {
        let mut tables = self.tables.write();

        if let Some(current) = tables.seated_in(&participant) {
            return Err(RegistryError::AlreadySeated(current));
        }

        let session_id = tables.next_session_id;
        tables.next_session_id += 1;

        let slot = Slot {
            session: Session::new(session_id, participant.clone()),
            retired: false,
        };
        tables
            .sessions
            .insert(session_id, Arc::new(Mutex::new(slot)));
        tables.participants.insert(participant.clone(), session_id);

        info!("Session {} created by {:?}", session_id, participant);
        Ok(session_id)
    }

    /// Seats `participant` as black in an awaiting session
    pub fn connect_to_game(
        &self,
        participant: P,
        session_id: SessionId,
    ) -> Result<SessionView<P>, RegistryError> {
        let mut tables = self.tables.write();

        // Joining the own session is left to the session as a self-connect
        match tables.seated_in(&participant) {
            Some(current) if current != session_id => {
                return Err(RegistryError::AlreadySeated(current))
            }
            _ => {}
        }

        let handle = tables
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(RegistryError::NotFound(session_id))?;
        let mut slot = handle.lock();
        if slot.retired {
            return Err(RegistryError::NotFound(session_id));
        }

        slot.session.try_connect(participant.clone())?;
        tables.participants.insert(participant.clone(), session_id);

        info!("Session {} started, {:?} joined", session_id, participant);
        Ok(SessionView::of(&slot.session))
    }

    /// Applies a move and garbage-collects the session if the game is over
    pub fn submit_move(
        &self,
        participant: &P,
        session_id: SessionId,
        pos: Position,
    ) -> Result<MoveOutcome<P>, RegistryError> {
        let handle = self
            .slot(session_id)
            .ok_or(RegistryError::NotFound(session_id))?;

        let (outcome, seated) = {
            let mut slot = handle.lock();
            if slot.retired {
                return Err(RegistryError::NotFound(session_id));
            }

            let opponent = match slot.session.opponent_of(participant) {
                Some(opponent) => opponent.clone(),
                None if slot.session.state() == SessionState::Active => {
                    return Err(SessionError::NotYourTurn.into())
                }
                None => return Err(SessionError::NotStarted.into()),
            };

            let flipped = slot.session.submit_move(participant, pos)?;
            debug!(
                "Session {}: {:?} played {}, flipped {}",
                session_id, participant, pos, flipped
            );

            let finished = slot.session.game().is_finished();
            let mut seated = Vec::new();
            if finished {
                slot.retired = true;
                seated = slot.session.participants().cloned().collect();

                let (white, black) = slot.session.game().score();
                info!(
                    "Session {} finished: white {} black {}",
                    session_id, white, black
                );
                debug!("Final board:\n{}", slot.session.game().board());
            }

            let outcome = MoveOutcome {
                session_id,
                opponent,
                flipped,
                finished,
            };
            (outcome, seated)
        };

        if outcome.finished {
            let mut tables = self.tables.write();
            tables.sessions.remove(&session_id);
            tables.unlink(session_id, &seated);
        }

        Ok(outcome)
    }

    pub fn find_by_session_id(&self, session_id: SessionId) -> Option<SessionView<P>> {
        let handle = self.slot(session_id)?;
        let slot = handle.lock();
        if slot.retired {
            return None;
        }
        Some(SessionView::of(&slot.session))
    }

    pub fn find_by_participant(&self, participant: &P) -> Option<SessionView<P>> {
        let handle = {
            let tables = self.tables.read();
            let session_id = tables.participants.get(participant)?;
            tables.sessions.get(session_id).cloned()?
        };

        let slot = handle.lock();
        if slot.retired || !slot.session.participants().any(|p| p == participant) {
            return None;
        }
        Some(SessionView::of(&slot.session))
    }

    /// Removes a session and its participant entries whatever the game state.
    /// Returns false if the session was already gone.
    pub fn remove_session(&self, session_id: SessionId) -> bool {
        let mut tables = self.tables.write();

        let Some(handle) = tables.sessions.remove(&session_id) else {
            return false;
        };

        let seated: Vec<P> = {
            let mut slot = handle.lock();
            slot.retired = true;
            slot.session.participants().cloned().collect()
        };
        tables.unlink(session_id, &seated);

        info!("Session {} removed", session_id);
        true
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.tables.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, session_id: SessionId) -> Option<SlotHandle<P>> {
        self.tables.read().sessions.get(&session_id).cloned()
    }
}

impl<P: Participant> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Cell, Game, MoveError};
    use std::sync::Barrier;
    use std::thread;
    use tokio_test::{assert_err, assert_ok};

    fn started_game(registry: &Registry<u32>) -> SessionId {
        let session_id = registry.create_game(1).unwrap();
        assert_ok!(registry.connect_to_game(2, session_id));
        session_id
    }

    /// Installs a nearly finished game where white's move at (0,0) ends it
    fn install_endgame(registry: &Registry<u32>) -> SessionId {
        let session_id = started_game(registry);
        let mut cells = [[Cell::Empty; 8]; 8];
        cells[0][1] = Cell::Black;
        cells[0][2] = Cell::White;
        let game = Game::from_parts(Board::from_rows(cells), Side::White);

        let handle = registry.slot(session_id).unwrap();
        let mut slot = handle.lock();
        let mut session = Session::with_game(session_id, game, 1);
        session.try_connect(2).unwrap();
        slot.session = session;
        session_id
    }

    #[test]
    fn test_create_game_ids_start_at_zero_and_increase() {
        let registry = Registry::new();

        assert_eq!(registry.create_game(1u32).unwrap(), 0);
        assert_eq!(registry.create_game(2).unwrap(), 1);
        assert_eq!(registry.create_game(3).unwrap(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let registry = Registry::new();

        let first = registry.create_game(1u32).unwrap();
        assert!(registry.remove_session(first));
        assert_eq!(registry.create_game(1).unwrap(), 1);
    }

    #[test]
    fn test_created_session_is_indexed_both_ways() {
        let registry = Registry::new();
        let session_id = registry.create_game(7u32).unwrap();

        let by_id = registry.find_by_session_id(session_id).unwrap();
        assert_eq!(by_id.white, 7);
        assert_eq!(by_id.black, None);
        assert_eq!(by_id.state, SessionState::AwaitingOpponent);

        let by_participant = registry.find_by_participant(&7).unwrap();
        assert_eq!(by_participant, by_id);
    }

    #[test]
    fn test_connect_to_available_game() {
        let registry = Registry::new();
        let session_id = registry.create_game(1u32).unwrap();

        let view = assert_ok!(registry.connect_to_game(2, session_id));

        assert_eq!(view.id, session_id);
        assert_eq!(view.state, SessionState::Active);
        assert_eq!(view.opponent_of(&2), Some(&1));
        assert_eq!(registry.find_by_participant(&2).unwrap().id, session_id);
    }

    #[test]
    fn test_connect_to_non_existing_game() {
        let registry: Registry<u32> = Registry::new();

        let err = assert_err!(registry.connect_to_game(2, 0));

        assert_eq!(err, RegistryError::NotFound(0));
        assert!(registry.find_by_participant(&2).is_none());
    }

    #[test]
    fn test_connect_to_full_game() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let err = assert_err!(registry.connect_to_game(3, session_id));

        assert_eq!(err, RegistryError::Session(SessionError::AlreadyStarted));
        assert!(registry.find_by_participant(&3).is_none());
    }

    #[test]
    fn test_connect_to_own_game() {
        let registry = Registry::new();
        let session_id = registry.create_game(1u32).unwrap();

        let err = assert_err!(registry.connect_to_game(1, session_id));

        assert_eq!(err, RegistryError::Session(SessionError::SelfConnect));
        let view = registry.find_by_session_id(session_id).unwrap();
        assert_eq!(view.state, SessionState::AwaitingOpponent);
    }

    #[test]
    fn test_make_valid_turn() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let outcome = assert_ok!(registry.submit_move(&1, session_id, Position::new(4, 2)));

        assert_eq!(
            outcome,
            MoveOutcome {
                session_id,
                opponent: 2,
                flipped: 1,
                finished: false,
            }
        );
        let view = registry.find_by_session_id(session_id).unwrap();
        assert_eq!(view.side_to_move, Side::Black);
        assert_eq!(view.board.get(Position::new(4, 3)), Some(Cell::White));
    }

    #[test]
    fn test_make_invalid_turn() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let err = assert_err!(registry.submit_move(&1, session_id, Position::new(0, 0)));

        assert_eq!(
            err,
            RegistryError::Session(SessionError::IllegalMove(MoveError::NoCapture(
                Position::new(0, 0)
            )))
        );
    }

    #[test]
    fn test_make_turn_in_unknown_game() {
        let registry = Registry::new();
        started_game(&registry);

        let err = assert_err!(registry.submit_move(&1, 2, Position::new(4, 2)));

        assert_eq!(err, RegistryError::NotFound(2));
    }

    #[test]
    fn test_make_turn_in_invalid_order() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let err = assert_err!(registry.submit_move(&2, session_id, Position::new(4, 2)));

        assert_eq!(err, RegistryError::Session(SessionError::NotYourTurn));
        let view = registry.find_by_session_id(session_id).unwrap();
        assert_eq!(view.board, Board::initial());
    }

    #[test]
    fn test_make_turn_in_not_started_game() {
        let registry = Registry::new();
        let session_id = registry.create_game(1u32).unwrap();

        let err = assert_err!(registry.submit_move(&1, session_id, Position::new(4, 2)));

        assert_eq!(err, RegistryError::Session(SessionError::NotStarted));
    }

    #[test]
    fn test_make_turn_as_stranger() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let err = assert_err!(registry.submit_move(&9, session_id, Position::new(4, 2)));

        assert_eq!(err, RegistryError::Session(SessionError::NotYourTurn));
    }

    #[test]
    fn test_finishing_move_removes_session() {
        let registry = Registry::new();
        let session_id = install_endgame(&registry);

        let outcome = assert_ok!(registry.submit_move(&1, session_id, Position::new(0, 0)));

        assert!(outcome.finished);
        assert_eq!(outcome.opponent, 2);
        assert!(registry.find_by_session_id(session_id).is_none());
        assert!(registry.find_by_participant(&1).is_none());
        assert!(registry.find_by_participant(&2).is_none());
        assert!(registry.is_empty());

        let err = assert_err!(registry.submit_move(&2, session_id, Position::new(0, 3)));
        assert_eq!(err, RegistryError::NotFound(session_id));
    }

    #[test]
    fn test_remove_session() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        assert!(registry.remove_session(session_id));

        assert!(registry.find_by_session_id(session_id).is_none());
        assert!(registry.find_by_participant(&1).is_none());
        assert!(registry.find_by_participant(&2).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_session_is_idempotent() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        assert!(registry.remove_session(session_id));
        assert!(!registry.remove_session(session_id));
        assert!(!registry.remove_session(999));
    }

    #[test]
    fn test_create_while_seated_is_refused() {
        let registry = Registry::new();
        let session_id = started_game(&registry);

        let err = assert_err!(registry.create_game(1));
        assert_eq!(err, RegistryError::AlreadySeated(session_id));
        let err = assert_err!(registry.create_game(2));
        assert_eq!(err, RegistryError::AlreadySeated(session_id));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_participant(&1).unwrap().id, session_id);
    }

    #[test]
    fn test_create_twice_while_awaiting_is_refused() {
        let registry = Registry::new();
        let session_id = registry.create_game(1u32).unwrap();

        let err = assert_err!(registry.create_game(1));

        assert_eq!(err, RegistryError::AlreadySeated(session_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_connect_while_seated_elsewhere_is_refused() {
        let registry = Registry::new();
        let playing = started_game(&registry);
        let awaiting = registry.create_game(3u32).unwrap();

        let err = assert_err!(registry.connect_to_game(1, awaiting));
        assert_eq!(err, RegistryError::AlreadySeated(playing));

        // Waiting in one game also blocks joining another
        let err = assert_err!(registry.connect_to_game(3, playing));
        assert_eq!(err, RegistryError::AlreadySeated(awaiting));

        let view = registry.find_by_session_id(awaiting).unwrap();
        assert_eq!(view.state, SessionState::AwaitingOpponent);
        assert_eq!(registry.find_by_participant(&1).unwrap().id, playing);
    }

    #[test]
    fn test_seat_is_released_when_session_ends() {
        let registry = Registry::new();
        let removed = started_game(&registry);
        assert!(registry.remove_session(removed));
        assert_ok!(registry.create_game(1));
        assert_ok!(registry.create_game(2));

        let registry = Registry::new();
        let finished = install_endgame(&registry);
        assert_ok!(registry.submit_move(&1, finished, Position::new(0, 0)));
        let again = assert_ok!(registry.create_game(1));
        assert_ok!(registry.connect_to_game(2, again));
    }

    #[test]
    fn test_concurrent_creates_get_unique_ids() {
        let registry = Arc::new(Registry::new());
        let threads = 8;
        let per_thread = 100;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..per_thread)
                        .map(|i| registry.create_game((t * per_thread + i) as u32).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<SessionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), threads * per_thread);
        assert_eq!(ids.first(), Some(&0));
        assert_eq!(ids.last(), Some(&((threads * per_thread - 1) as SessionId)));
    }

    #[test]
    fn test_concurrent_connects_seat_exactly_one() {
        let registry = Arc::new(Registry::new());
        let session_id = registry.create_game(0u32).unwrap();
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (1..=contenders as u32)
            .map(|id| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.connect_to_game(id, session_id).is_ok()
                })
            })
            .collect();

        let seated = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(seated, 1);
    }

    #[test]
    fn test_concurrent_moves_accept_only_side_to_move() {
        for _ in 0..50 {
            let registry = Arc::new(Registry::new());
            let session_id = started_game(&registry);
            let barrier = Arc::new(Barrier::new(2));

            // Black's (5,2) is only legal once white has played (4,2)
            let moves = [(1u32, Position::new(4, 2)), (2u32, Position::new(5, 2))];
            let handles: Vec<_> = moves
                .into_iter()
                .map(|(player, pos)| {
                    let registry = Arc::clone(&registry);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        registry.submit_move(&player, session_id, pos)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert!(results[0].is_ok());
            let view = registry.find_by_session_id(session_id).unwrap();
            match &results[1] {
                // Black lost the race and was rejected
                Err(err) => {
                    assert_eq!(err, &RegistryError::Session(SessionError::NotYourTurn));
                    assert_eq!(view.side_to_move, Side::Black);
                }
                Ok(_) => assert_eq!(view.side_to_move, Side::White),
            }
        }
    }

    #[test]
    fn test_concurrent_remove_and_finish() {
        for _ in 0..50 {
            let registry = Arc::new(Registry::new());
            let session_id = install_endgame(&registry);
            let barrier = Arc::new(Barrier::new(2));

            let mover = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.submit_move(&1, session_id, Position::new(0, 0))
                })
            };
            let remover = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.remove_session(session_id)
                })
            };

            let moved = mover.join().unwrap();
            let _removed = remover.join().unwrap();

            if let Err(err) = moved {
                assert_eq!(err, RegistryError::NotFound(session_id));
            }
            assert!(registry.is_empty());
            assert!(registry.find_by_participant(&1).is_none());
            assert!(registry.find_by_participant(&2).is_none());
        }
    }
}

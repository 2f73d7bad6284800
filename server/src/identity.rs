//! Participant identities used as keys by sessions and the registry.

use std::fmt;
use std::hash::Hash;

/// Anything that can stand for one side of a session.
///
/// Identities are only ever compared, hashed and handed back to the caller;
/// the core never looks inside them.
pub trait Participant: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Participant for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Opaque handle for one live connection, assigned by the connection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

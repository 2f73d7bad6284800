//! Connected peer tracking for the connection loop
//!
//! This module keeps the server-side table of live WebSocket connections:
//! - Connection identity allocation and capacity enforcement
//! - Outbound channel per connection, drained by that connection's writer task
//! - The wire codec each connection last spoke, so replies match it
//!
//! The table is the only place that maps a `ConnectionId` back to a socket.
//! Sessions and the registry never see it.

use crate::identity::ConnectionId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

/// Frame encoding a connection is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Whitespace-delimited commands in text frames
    #[default]
    Text,
    /// bincode messages in binary frames
    Binary,
}

/// One live connection
#[derive(Debug)]
pub struct Peer {
    /// Identity handed to the handler as the participant key
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the handshake completed
    pub connected_at: Instant,
    /// Codec used for replies to this peer
    pub codec: Codec,
    outbound: UnboundedSender<Message>,
}

impl Peer {
    pub fn new(id: ConnectionId, addr: SocketAddr, outbound: UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            codec: Codec::Text,
            outbound,
        }
    }

    /// Queues a frame for the writer task. Returns false once the writer is gone.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// All live connections, bounded by a capacity limit
///
/// Connection ids start at 1 and are never reused during the process
/// lifetime, so a late delivery can never reach a newer connection.
pub struct PeerManager {
    /// Connected peers indexed by their id
    peers: HashMap<ConnectionId, Peer>,
    /// Next id for an accepted connection
    next_peer_id: u64,
    /// Maximum number of concurrent connections
    max_peers: usize,
}

impl PeerManager {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            next_peer_id: 1,
            max_peers,
        }
    }

    /// Registers a connection. Returns None if the server is at capacity.
    pub fn add_peer(
        &mut self,
        addr: SocketAddr,
        outbound: UnboundedSender<Message>,
    ) -> Option<ConnectionId> {
        if self.peers.len() >= self.max_peers {
            return None;
        }

        let id = ConnectionId::new(self.next_peer_id);
        self.next_peer_id += 1;

        info!("Connection {} opened from {}", id, addr);
        self.peers.insert(id, Peer::new(id, addr, outbound));

        Some(id)
    }

    /// Returns true if the peer was present
    pub fn remove_peer(&mut self, id: &ConnectionId) -> bool {
        if let Some(peer) = self.peers.remove(id) {
            info!(
                "Connection {} from {} closed after {:.1}s",
                peer.id,
                peer.addr,
                peer.uptime().as_secs_f64()
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// Records the codec of the latest inbound frame. Returns false for an
    /// unknown peer.
    pub fn set_codec(&mut self, id: &ConnectionId, codec: Codec) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.codec = codec;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn channel() -> UnboundedSender<Message> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn test_peer_creation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Peer::new(ConnectionId::new(1), test_addr(), tx);

        assert_eq!(peer.id, ConnectionId::new(1));
        assert_eq!(peer.addr, test_addr());
        assert_eq!(peer.codec, Codec::Text);

        assert!(peer.send(Message::Text("ok".to_string())));
        assert_eq!(rx.try_recv().unwrap(), Message::Text("ok".to_string()));
    }

    #[test]
    fn test_send_after_writer_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Peer::new(ConnectionId::new(1), test_addr(), tx);
        drop(rx);

        assert!(!peer.send(Message::Text("ok".to_string())));
    }

    #[test]
    fn test_peer_manager_creation() {
        let manager = PeerManager::new(5);
        assert_eq!(manager.max_peers, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_peers() {
        let mut manager = PeerManager::new(3);

        let id1 = manager.add_peer(test_addr(), channel()).unwrap();
        let id2 = manager.add_peer(test_addr2(), channel()).unwrap();

        assert_eq!(id1, ConnectionId::new(1));
        assert_eq!(id2, ConnectionId::new(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_peer_max_capacity() {
        let mut manager = PeerManager::new(1);

        assert!(manager.add_peer(test_addr(), channel()).is_some());
        assert!(manager.add_peer(test_addr2(), channel()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut manager = PeerManager::new(1);

        let id1 = manager.add_peer(test_addr(), channel()).unwrap();
        assert!(manager.remove_peer(&id1));
        let id2 = manager.add_peer(test_addr(), channel()).unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_remove_peer() {
        let mut manager = PeerManager::new(2);
        let id = manager.add_peer(test_addr(), channel()).unwrap();

        assert!(manager.remove_peer(&id));
        assert!(manager.is_empty());
        assert!(!manager.remove_peer(&id));
    }

    #[test]
    fn test_codec_tracking() {
        let mut manager = PeerManager::new(2);
        let id = manager.add_peer(test_addr(), channel()).unwrap();

        assert_eq!(manager.get(&id).unwrap().codec, Codec::Text);
        assert!(manager.set_codec(&id, Codec::Binary));
        assert_eq!(manager.get(&id).unwrap().codec, Codec::Binary);

        let unknown = ConnectionId::new(99);
        assert!(!manager.set_codec(&unknown, Codec::Binary));
        assert!(manager.get(&unknown).is_none());
    }
}

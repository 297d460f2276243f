//! Peer connection registry for the arena server
//!
//! This module tracks every connected peer and the tasks serving it:
//! - Session handle allocation, independent of snake ids and sockets
//! - The outbound byte queue drained by each peer's writer task
//! - Targeted sends and broadcasts that can skip the originating peer
//!
//! The registry is owned by the server loop and never shared, so it needs
//! no locking. Sessions are keyed by a monotonically increasing handle, which
//! means an event from a torn-down connection can never be attributed to a
//! later peer that reuses the same snake id.

use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A connected peer and the tasks serving its socket
///
/// Each peer maintains:
/// - The snake id it controls and the session handle its events carry
/// - A queue of encoded packets waiting to be written to its socket
/// - Handles to its reader and writer tasks for teardown
#[derive(Debug)]
pub struct Peer {
    /// Snake slot controlled by this peer
    pub id: u8,
    /// Handle tagging every event coming from this connection
    pub session: u64,
    /// Remote address, for logging
    pub addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Peer {
    /// Creates a peer whose packets are delivered through `outbound`
    pub fn new(
        id: u8,
        session: u64,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            session,
            addr,
            outbound,
            reader: None,
            writer: None,
        }
    }

    /// Attaches the reader and writer tasks serving this peer
    pub fn with_tasks(mut self, reader: JoinHandle<()>, writer: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self.writer = Some(writer);
        self
    }

    /// Queues bytes for the writer task
    ///
    /// Returns false if the writer has already gone away, which happens
    /// when the socket failed and teardown is on its way.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.outbound.send(bytes).is_ok()
    }

    /// Stops reading from the peer and closes its outbound queue
    ///
    /// The writer still flushes whatever was queued before the socket is
    /// shut down. Its handle is returned so callers can wait for that.
    pub fn hang_up(mut self) -> Option<JoinHandle<()>> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer.take()
    }
}

/// Registry of all connected peers
///
/// The PeerManager hands out session handles, routes packets to single
/// peers by snake id, and fans broadcasts out to everyone except an
/// optional originator so that relayed events are never echoed back.
pub struct PeerManager {
    /// Connected peers indexed by session handle
    peers: HashMap<u64, Peer>,
    /// Next session handle to hand out
    next_session: u64,
}

impl PeerManager {
    /// Creates an empty registry. Session handles start from 1.
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            next_session: 1,
        }
    }

    /// Reserves a fresh session handle for a connection being set up
    pub fn next_session(&mut self) -> u64 {
        let session = self.next_session;
        self.next_session += 1;
        session
    }

    /// Registers a fully set up peer
    pub fn add(&mut self, peer: Peer) {
        info!(
            "Peer {} (session {}) connected from {}",
            peer.id, peer.session, peer.addr
        );
        self.peers.insert(peer.session, peer);
    }

    /// Snake id controlled by a session, if it is still connected
    pub fn id_of(&self, session: u64) -> Option<u8> {
        self.peers.get(&session).map(|peer| peer.id)
    }

    /// Removes a peer from the registry
    ///
    /// Returns None if the session is unknown or was already removed, so a
    /// disconnect reported twice is only handled once.
    pub fn remove(&mut self, session: u64) -> Option<Peer> {
        let peer = self.peers.remove(&session)?;
        info!("Peer {} (session {}) disconnected", peer.id, peer.session);
        Some(peer)
    }

    /// Sends bytes to the peer controlling snake `id`
    pub fn send_to(&self, id: u8, bytes: Vec<u8>) -> bool {
        match self.peers.values().find(|peer| peer.id == id) {
            Some(peer) => peer.send(bytes),
            None => false,
        }
    }

    /// Queues the same bytes for every peer except `exclude`
    ///
    /// Returns how many peers the bytes were queued for.
    pub fn broadcast(&self, bytes: &[u8], exclude: Option<u8>) -> usize {
        let mut delivered = 0;
        for peer in self.peers.values() {
            if Some(peer.id) == exclude {
                continue;
            }
            if peer.send(bytes.to_vec()) {
                delivered += 1;
            } else {
                debug!("Outbound queue of peer {} is closed", peer.id);
            }
        }
        delivered
    }

    /// Removes every peer, for shutdown
    pub fn drain(&mut self) -> Vec<Peer> {
        self.peers.drain().map(|(_, peer)| peer).collect()
    }

    /// Returns the number of currently connected peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if no peers are currently connected
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_peer(
        manager: &mut PeerManager,
        id: u8,
    ) -> (Peer, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = manager.next_session();
        (Peer::new(id, session, test_addr(), tx), rx)
    }

    #[test]
    fn test_manager_creation() {
        let manager = PeerManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_session_handles_increase() {
        let mut manager = PeerManager::new();
        assert_eq!(manager.next_session(), 1);
        assert_eq!(manager.next_session(), 2);
        assert_eq!(manager.next_session(), 3);
    }

    #[test]
    fn test_add_and_lookup() {
        let mut manager = PeerManager::new();
        let (peer, _rx) = test_peer(&mut manager, 4);
        let session = peer.session;

        manager.add(peer);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.id_of(session), Some(4));
        assert_eq!(manager.id_of(session + 1), None);
    }

    #[test]
    fn test_remove_only_once() {
        let mut manager = PeerManager::new();
        let (peer, _rx) = test_peer(&mut manager, 1);
        let session = peer.session;
        manager.add(peer);

        assert!(manager.remove(session).is_some());
        assert!(manager.remove(session).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_excludes_originator() {
        let mut manager = PeerManager::new();
        let (a, mut rx_a) = test_peer(&mut manager, 1);
        let (b, mut rx_b) = test_peer(&mut manager, 2);
        let (c, mut rx_c) = test_peer(&mut manager, 3);
        manager.add(a);
        manager.add(b);
        manager.add(c);

        let delivered = manager.broadcast(&[0, 2, 1], Some(2));

        assert_eq!(delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), vec![0, 2, 1]);
        assert!(rx_b.try_recv().is_err());
        assert_eq!(rx_c.try_recv().unwrap(), vec![0, 2, 1]);
    }

    #[test]
    fn test_broadcast_to_everyone() {
        let mut manager = PeerManager::new();
        let (a, mut rx_a) = test_peer(&mut manager, 1);
        let (b, mut rx_b) = test_peer(&mut manager, 2);
        manager.add(a);
        manager.add(b);

        assert_eq!(manager.broadcast(&[4, 0], None), 2);
        assert_eq!(rx_a.try_recv().unwrap(), vec![4, 0]);
        assert_eq!(rx_b.try_recv().unwrap(), vec![4, 0]);
    }

    #[test]
    fn test_send_to_single_peer() {
        let mut manager = PeerManager::new();
        let (a, mut rx_a) = test_peer(&mut manager, 1);
        let (b, mut rx_b) = test_peer(&mut manager, 2);
        manager.add(a);
        manager.add(b);

        assert!(manager.send_to(2, vec![2, 7]));
        assert!(!manager.send_to(9, vec![2, 9]));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), vec![2, 7]);
    }

    #[test]
    fn test_closed_queue_not_counted() {
        let mut manager = PeerManager::new();
        let (a, rx_a) = test_peer(&mut manager, 1);
        manager.add(a);
        drop(rx_a);

        assert_eq!(manager.broadcast(&[1, 0, 1, 0, 1], None), 0);
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut manager = PeerManager::new();
        let (a, _rx_a) = test_peer(&mut manager, 3);
        let (b, _rx_b) = test_peer(&mut manager, 1);
        manager.add(a);
        manager.add(b);

        let mut drained: Vec<u8> = manager.drain().into_iter().map(|p| p.id).collect();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 3]);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_hang_up_closes_queue() {
        let mut manager = PeerManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let session = manager.next_session();
        let writer = tokio::spawn(async move {
            let mut written = Vec::new();
            while let Some(bytes) = rx.recv().await {
                written.extend(bytes);
            }
            assert_eq!(written, vec![4, 0]);
        });
        let reader = tokio::spawn(std::future::pending::<()>());
        let peer = Peer::new(1, session, test_addr(), tx).with_tasks(reader, writer);

        assert!(peer.send(vec![4, 0]));
        let writer = peer.hang_up().unwrap();
        writer.await.unwrap();
    }
}

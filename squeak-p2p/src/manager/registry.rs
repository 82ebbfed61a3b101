//! The authoritative set of connected peers.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{P2pError, P2pResult};
use crate::peer::{Peer, PeerSnapshot};

/// Capacity of the membership-change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Live peers keyed by remote address.
///
/// Every query and mutation takes the single internal lock. When peer state
/// is read under it, the registry lock is always taken first. Outbound dials
/// in flight hold a slot in a second set, locked after the peer map.
pub struct ConnectionRegistry {
    max_peers: usize,
    peers: Mutex<HashMap<SocketAddr, Arc<Peer>>>,
    dialing: Mutex<HashSet<SocketAddr>>,
    changes: broadcast::Sender<Vec<PeerSnapshot>>,
}

impl ConnectionRegistry {
    /// Create an empty registry admitting at most `max_peers` outgoing peers.
    pub fn new(max_peers: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            max_peers,
            peers: Mutex::new(HashMap::new()),
            dialing: Mutex::new(HashSet::new()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, Arc<Peer>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dialing(&self) -> MutexGuard<'_, HashSet<SocketAddr>> {
        self.dialing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Claim a slot for an outbound dial to `addr`.
    ///
    /// Registered peers and dials in flight together never exceed
    /// `max_peers`. The slot is held until [`release_dial`](Self::release_dial).
    pub fn reserve_dial(&self, addr: SocketAddr) -> P2pResult<()> {
        let peers = self.lock();
        let mut dialing = self.lock_dialing();
        if peers.contains_key(&addr) || dialing.contains(&addr) {
            return Err(P2pError::DuplicatePeer { addr });
        }
        if peers.len() + dialing.len() >= self.max_peers {
            return Err(P2pError::MaxConnectionsReached {
                max: self.max_peers,
            });
        }
        dialing.insert(addr);
        Ok(())
    }

    pub fn release_dial(&self, addr: &SocketAddr) {
        self.lock_dialing().remove(addr);
    }

    /// Whether another dial would fit.
    pub fn can_dial(&self) -> bool {
        let peers = self.lock();
        peers.len() + self.lock_dialing().len() < self.max_peers
    }

    pub fn dialing_count(&self) -> usize {
        self.lock_dialing().len()
    }

    /// Admit a peer.
    ///
    /// Outgoing peers are refused when the registry is full. Any peer is
    /// refused if its address is already present. The caller closes a
    /// refused peer.
    pub fn try_add(&self, peer: Arc<Peer>) -> P2pResult<()> {
        let snapshot = {
            let mut peers = self.lock();
            let addr = peer.addr();
            if peers.contains_key(&addr) {
                return Err(P2pError::DuplicatePeer { addr });
            }
            if peer.is_outgoing() && peers.len() >= self.max_peers {
                return Err(P2pError::MaxConnectionsReached {
                    max: self.max_peers,
                });
            }
            peers.insert(addr, peer);
            Self::snapshot_of(&peers)
        };
        self.publish(snapshot);
        Ok(())
    }

    /// Remove `peer` if it is the registered entry for its address.
    ///
    /// Removing a peer that is not present is a no-op.
    pub fn remove(&self, peer: &Arc<Peer>) -> bool {
        let snapshot = {
            let mut peers = self.lock();
            let addr = peer.addr();
            let registered = peers
                .get(&addr)
                .map_or(false, |existing| Arc::ptr_eq(existing, peer));
            if !registered {
                return false;
            }
            peers.remove(&addr);
            Self::snapshot_of(&peers)
        };
        self.publish(snapshot);
        true
    }

    pub fn has_address(&self, addr: &SocketAddr) -> bool {
        self.lock().contains_key(addr)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<Peer>> {
        self.lock().get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether fewer than `max_peers` peers have completed the handshake.
    pub fn needs_more_peers(&self) -> bool {
        self.handshaked_count() < self.max_peers
    }

    pub fn handshaked_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|p| p.is_handshake_complete())
            .count()
    }

    /// Peers that completed the handshake, copied under the lock.
    pub fn handshaked_peers(&self) -> Vec<Arc<Peer>> {
        self.lock()
            .values()
            .filter(|p| p.is_handshake_complete())
            .cloned()
            .collect()
    }

    /// Every registered peer, copied under the lock.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.lock().values().cloned().collect()
    }

    pub fn snapshots(&self) -> Vec<PeerSnapshot> {
        Self::snapshot_of(&self.lock())
    }

    /// Whether any registered peer sent a version carrying `nonce`.
    pub fn has_local_nonce(&self, nonce: u64) -> bool {
        self.lock()
            .values()
            .any(|p| p.local_nonce() == Some(nonce))
    }

    /// Receive the peer list after every membership or handshake change.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<PeerSnapshot>> {
        self.changes.subscribe()
    }

    /// Publish the current peer list to subscribers.
    pub fn notify_changed(&self) {
        let snapshot = self.snapshots();
        self.publish(snapshot);
    }

    /// Close every registered peer. Their workers remove them.
    pub fn close_all(&self) {
        for peer in self.peers() {
            peer.close();
        }
    }

    fn snapshot_of(peers: &HashMap<SocketAddr, Arc<Peer>>) -> Vec<PeerSnapshot> {
        let mut out: Vec<_> = peers.values().map(|p| p.snapshot()).collect();
        out.sort_by_key(|s| s.addr);
        out
    }

    fn publish(&self, snapshot: Vec<PeerSnapshot>) {
        debug!(peers = snapshot.len(), "peer set changed");
        // No subscribers is fine.
        let _ = self.changes.send(snapshot);
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("max_peers", &self.max_peers)
            .field("len", &self.len())
            .field("dialing", &self.dialing_count())
            .finish()
    }
}

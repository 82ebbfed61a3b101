//! State shared by the listener, dialer and every peer worker.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use squeak_core::SqueakHash;
use squeak_storage::SqueakStore;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::P2pConfig;
use crate::manager::ConnectionRegistry;

const SQUEAK_EVENT_CAPACITY: usize = 256;

/// Collaborators handed to the handshake and dispatch functions.
pub struct P2pContext {
    pub config: P2pConfig,
    pub registry: ConnectionRegistry,
    pub squeaks: Arc<dyn SqueakStore>,
    /// Cancelled when the node shuts down.
    pub shutdown: CancellationToken,
    local_addr: RwLock<SocketAddr>,
    squeak_events: broadcast::Sender<SqueakHash>,
}

impl P2pContext {
    pub fn new(config: P2pConfig, squeaks: Arc<dyn SqueakStore>) -> Self {
        let (squeak_events, _) = broadcast::channel(SQUEAK_EVENT_CAPACITY);
        Self {
            registry: ConnectionRegistry::new(config.max_peers),
            local_addr: RwLock::new(config.bind_addr),
            config,
            squeaks,
            shutdown: CancellationToken::new(),
            squeak_events,
        }
    }

    /// Our listening address, as advertised in version messages.
    pub fn local_addr(&self) -> SocketAddr {
        *self.local_addr.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_local_addr(&self, addr: SocketAddr) {
        *self.local_addr.write().unwrap_or_else(PoisonError::into_inner) = addr;
    }

    /// Announce a newly stored squeak to subscribers.
    pub fn notify_squeak(&self, hash: SqueakHash) {
        let _ = self.squeak_events.send(hash);
    }

    pub fn subscribe_squeaks(&self) -> broadcast::Receiver<SqueakHash> {
        self.squeak_events.subscribe()
    }
}

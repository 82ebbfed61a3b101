//! The network handle used by the node.

use std::net::SocketAddr;
use std::sync::Arc;

use squeak_core::SqueakHash;
use squeak_storage::SqueakStore;
use tokio::net::{lookup_host, TcpListener};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::P2pConfig;
use crate::context::P2pContext;
use crate::error::{P2pError, P2pResult};
use crate::manager::{connect, run_listener, spawn_connect};
use crate::peer::PeerSnapshot;
use crate::protocol::Message;

/// Main P2P node.
///
/// Cheap to clone; clones share the same listener, registry and workers.
#[derive(Clone)]
pub struct P2pNode {
    ctx: Arc<P2pContext>,
}

impl P2pNode {
    /// Create a node serving squeaks from `squeaks`. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: P2pConfig, squeaks: Arc<dyn SqueakStore>) -> Self {
        Self {
            ctx: Arc::new(P2pContext::new(config, squeaks)),
        }
    }

    /// Bind the listener, spawn the accept loop and dial the bootstrap peers.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// binding port 0.
    pub async fn start(&self) -> P2pResult<SocketAddr> {
        self.ctx.config.validate()?;
        let listener = TcpListener::bind(self.ctx.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.ctx.set_local_addr(local_addr);
        tracing::info!(addr = %local_addr, "Listening for inbound connections");

        tokio::spawn(run_listener(listener, self.ctx.clone()));

        for addr in &self.ctx.config.bootstrap_peers {
            spawn_connect(self.ctx.clone(), *addr);
        }
        Ok(local_addr)
    }

    /// The address we listen on.
    pub fn local_addr(&self) -> SocketAddr {
        self.ctx.local_addr()
    }

    /// Dial `addr` in the background.
    pub fn connect(&self, addr: SocketAddr) {
        spawn_connect(self.ctx.clone(), addr);
    }

    /// Dial `addr` and wait until the connection is admitted.
    ///
    /// The handshake continues in the peer's worker afterwards.
    pub async fn connect_peer(&self, addr: SocketAddr) -> P2pResult<()> {
        connect(self.ctx.clone(), addr).await
    }

    /// Resolve `host` and dial every address it resolves to.
    ///
    /// Returns the number of addresses dialed.
    pub async fn connect_host(&self, host: &str, port: u16) -> P2pResult<usize> {
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| P2pError::Resolve {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let mut dialed = 0;
        for addr in addrs {
            self.connect(addr);
            dialed += 1;
        }
        Ok(dialed)
    }

    /// Send `message` to every handshaked peer concurrently.
    ///
    /// A peer whose send fails is closed. Returns the number of peers the
    /// message reached.
    pub async fn broadcast(&self, message: Message) -> usize {
        let mut sends = JoinSet::new();
        for peer in self.ctx.registry.handshaked_peers() {
            let message = message.clone();
            sends.spawn(async move {
                match peer.send(message).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(peer = %peer.addr(), error = %e, "Broadcast send failed");
                        peer.close();
                        false
                    }
                }
            });
        }

        let mut sent = 0;
        while let Some(result) = sends.join_next().await {
            if matches!(result, Ok(true)) {
                sent += 1;
            }
        }
        sent
    }

    /// Snapshot of every connected peer.
    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.ctx.registry.snapshots()
    }

    /// Snapshot of the peers that completed the handshake.
    pub fn handshaked_peers(&self) -> Vec<PeerSnapshot> {
        self.ctx
            .registry
            .handshaked_peers()
            .iter()
            .map(|p| p.snapshot())
            .collect()
    }

    pub fn handshaked_count(&self) -> usize {
        self.ctx.registry.handshaked_count()
    }

    pub fn needs_more_peers(&self) -> bool {
        self.ctx.registry.needs_more_peers()
    }

    pub fn config(&self) -> &P2pConfig {
        &self.ctx.config
    }

    /// Receive the peer list whenever it changes.
    pub fn subscribe_peers_changed(&self) -> broadcast::Receiver<Vec<PeerSnapshot>> {
        self.ctx.registry.subscribe()
    }

    /// Receive the hash of every squeak newly stored from the network.
    pub fn subscribe_squeaks(&self) -> broadcast::Receiver<SqueakHash> {
        self.ctx.subscribe_squeaks()
    }

    /// Stop the listener and close every peer.
    pub fn shutdown(&self) {
        tracing::info!("P2P node shutting down");
        self.ctx.shutdown.cancel();
        self.ctx.registry.close_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }

    /// Shared state, for embedding code that drives peers directly.
    pub fn context(&self) -> &Arc<P2pContext> {
        &self.ctx
    }
}

impl std::fmt::Debug for P2pNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pNode")
            .field("local_addr", &self.local_addr())
            .field("registry", &self.ctx.registry)
            .finish()
    }
}

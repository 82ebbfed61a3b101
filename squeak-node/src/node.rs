//! Node orchestrator.
//!
//! [`SqueakNode`] ties the stores, the blockchain view and the P2P network
//! together. Content discovery is pull-based: a periodic sync loop asks peers
//! for more addresses while under the peer minimum, and asks for squeaks from
//! every followed author.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use squeak_core::{
    Address, Blockchain, KeyPair, LightningClient, Locator, Squeak, SqueakHash, SqueakMaker,
    NULL_HASH,
};
use squeak_p2p::protocol::{GetSqueaksMessage, Message};
use squeak_p2p::{P2pNode, PeerSnapshot};
use squeak_storage::{
    FollowStore, KeyStore, MemoryFollowStore, MemoryKeyStore, MemorySqueakStore, SqueakStore,
    ValidatingSqueakStore,
};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::rpc;
use crate::shutdown::{shutdown_channel, wait_for_shutdown_signal, ShutdownRx, ShutdownTx};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The main node structure.
pub struct SqueakNode {
    config: NodeConfig,
    p2p: P2pNode,
    blockchain: Arc<dyn Blockchain>,
    lightning: Option<Arc<dyn LightningClient>>,
    squeaks: Arc<dyn SqueakStore>,
    keys: Arc<dyn KeyStore>,
    follows: Arc<dyn FollowStore>,
    key_events: broadcast::Sender<Option<Address>>,
    follow_events: broadcast::Sender<Vec<Address>>,
    shutdown_tx: ShutdownTx,
}

impl SqueakNode {
    /// Create a node with in-memory stores over `blockchain`.
    ///
    /// Squeaks are validated against `blockchain` before they are stored,
    /// whether they come from a peer or are published locally.
    pub fn new(config: NodeConfig, blockchain: Arc<dyn Blockchain>) -> NodeResult<Self> {
        check_sync_interval(config.sync_interval)?;

        let squeaks: Arc<dyn SqueakStore> = Arc::new(ValidatingSqueakStore::new(
            MemorySqueakStore::new(),
            blockchain.clone(),
        ));
        let keys: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        if let Some(key) = &config.signing_key {
            keys.set(key.clone())?;
        }

        let p2p = P2pNode::new(config.p2p_config(), squeaks.clone());
        let (key_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (follow_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = shutdown_channel();

        Ok(Self {
            config,
            p2p,
            blockchain,
            lightning: None,
            squeaks,
            keys,
            follows: Arc::new(MemoryFollowStore::new()),
            key_events,
            follow_events,
            shutdown_tx,
        })
    }

    /// Attach a lightning client for wallet queries.
    pub fn with_lightning(mut self, client: Arc<dyn LightningClient>) -> Self {
        self.lightning = Some(client);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The underlying network handle.
    pub fn p2p(&self) -> &P2pNode {
        &self.p2p
    }

    // ---- lifecycle ----

    /// Start the P2P listener, dial seed peers and the configured host.
    ///
    /// Returns the bound P2P address.
    pub async fn start(&self) -> NodeResult<SocketAddr> {
        let addr = self.p2p.start().await?;

        if let Some((host, port)) = &self.config.connect_host {
            if let Err(e) = self.p2p.connect_host(host, *port).await {
                tracing::warn!(host = %host, error = %e, "Failed to connect to host");
            }
        }
        Ok(addr)
    }

    /// Stop the network and every background loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.p2p.shutdown();
    }

    /// Run the node until SIGINT/SIGTERM.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        tracing::info!("Starting squeak node...");
        tracing::info!("  P2P address: {}", self.config.p2p_addr);
        tracing::info!("  RPC address: {}", self.config.rpc_addr);
        tracing::info!("  Regtest height: {}", self.config.regtest_height);

        let p2p_addr = self.start().await?;
        tracing::info!("P2P listening on {}", p2p_addr);

        let rpc_state = Arc::new(rpc::RpcState::new(self.clone()));
        let rpc_handle = rpc::start_rpc_server(self.config.rpc_addr, rpc_state).await?;
        tracing::info!("RPC server listening on {}", rpc_handle.local_addr());

        let sync_handle = tokio::spawn(
            self.clone()
                .run_sync_loop(self.config.sync_interval, self.shutdown_tx.subscribe()),
        );

        wait_for_shutdown_signal().await;

        tracing::info!("Shutting down node...");
        self.shutdown();

        rpc_handle.stop()?;
        tracing::info!("RPC server stopped");

        match sync_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Sync loop failed"),
            Err(e) => tracing::error!(error = %e, "Sync loop panicked"),
        }
        tracing::info!("Node shutdown complete");
        Ok(())
    }

    /// Periodically look for peers and content until `shutdown` fires.
    pub async fn run_sync_loop(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: ShutdownRx,
    ) -> NodeResult<()> {
        check_sync_interval(period)?;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("Sync loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.find_more_peers().await;
                    if let Err(e) = self.find_content().await {
                        tracing::warn!(error = %e, "Content sync failed");
                    }
                }
            }
        }
    }

    // ---- network ----

    /// Ask handshaked peers for addresses when under the peer minimum.
    ///
    /// Returns the number of peers asked.
    pub async fn find_more_peers(&self) -> usize {
        if self.p2p.handshaked_count() >= self.p2p.config().min_peers {
            return 0;
        }
        let sent = self.p2p.broadcast(Message::GetAddr).await;
        tracing::trace!(peers = sent, "Requested addresses");
        sent
    }

    /// Ask handshaked peers for squeaks by every followed author.
    ///
    /// Nothing is sent while the follow list is empty, since an empty
    /// locator matches nothing.
    pub async fn find_content(&self) -> NodeResult<usize> {
        let follows = self.follows.list()?;
        let locator = Locator::from_follows(&follows);
        if locator.is_empty() {
            return Ok(0);
        }
        let sent = self
            .p2p
            .broadcast(Message::GetSqueaks(GetSqueaksMessage { locator }))
            .await;
        tracing::trace!(peers = sent, follows = follows.len(), "Requested squeaks");
        Ok(sent)
    }

    /// Dial `addr` and wait for the connection to be admitted.
    pub async fn connect_peer(&self, addr: SocketAddr) -> NodeResult<()> {
        Ok(self.p2p.connect_peer(addr).await?)
    }

    /// Resolve `host` and dial every address it resolves to.
    pub async fn connect_host(&self, host: &str, port: u16) -> NodeResult<usize> {
        Ok(self.p2p.connect_host(host, port).await?)
    }

    pub fn get_peers(&self) -> Vec<PeerSnapshot> {
        self.p2p.peers()
    }

    // ---- squeaks ----

    /// Sign `content` with the loaded key, bind it to the chain tip and store it.
    ///
    /// The squeak is not pushed to peers. They pull it through `getsqueaks`.
    pub fn publish(&self, content: &str, reply_to: Option<SqueakHash>) -> NodeResult<SqueakHash> {
        let key = self.keys.get()?.ok_or(NodeError::MissingSigningKey)?;
        let squeak = SqueakMaker::new(&key, self.blockchain.as_ref())
            .make_squeak(content, reply_to.unwrap_or(NULL_HASH))?;
        let hash = squeak.hash();

        self.add_squeak(squeak)?;
        tracing::debug!(hash = %hex::encode(hash), "Published squeak");
        Ok(hash)
    }

    /// Store a squeak. Returns `false` if it was already held.
    pub fn add_squeak(&self, squeak: Squeak) -> NodeResult<bool> {
        let hash = squeak.hash();
        let added = self.squeaks.add_squeak(squeak)?;
        if added {
            self.p2p.context().notify_squeak(hash);
        }
        Ok(added)
    }

    pub fn get_squeak(&self, hash: &SqueakHash) -> NodeResult<Option<Squeak>> {
        Ok(self.squeaks.get_squeak(hash)?)
    }

    pub fn get_squeaks(&self) -> NodeResult<Vec<Squeak>> {
        Ok(self.squeaks.get_squeaks()?)
    }

    pub fn get_squeaks_by_author(&self, address: &Address) -> NodeResult<Vec<Squeak>> {
        Ok(self.squeaks.get_squeaks_by_author(address)?)
    }

    // ---- follows ----

    /// Follow `address`. Returns `false` if it was already followed.
    pub fn add_follow(&self, address: Address) -> NodeResult<bool> {
        let added = self.follows.add(address)?;
        if added {
            self.notify_follows()?;
        }
        Ok(added)
    }

    /// Stop following `address`. Returns `false` if it was not followed.
    pub fn remove_follow(&self, address: &Address) -> NodeResult<bool> {
        let removed = self.follows.remove(address)?;
        if removed {
            self.notify_follows()?;
        }
        Ok(removed)
    }

    pub fn get_follows(&self) -> NodeResult<Vec<Address>> {
        Ok(self.follows.list()?)
    }

    fn notify_follows(&self) -> NodeResult<()> {
        let _ = self.follow_events.send(self.follows.list()?);
        Ok(())
    }

    // ---- keys ----

    pub fn get_signing_key(&self) -> NodeResult<Option<KeyPair>> {
        Ok(self.keys.get()?)
    }

    /// Address of the loaded signing key.
    pub fn get_address(&self) -> NodeResult<Option<Address>> {
        Ok(self.keys.get()?.map(|key| key.address()))
    }

    /// Replace the signing key.
    pub fn set_signing_key(&self, key: KeyPair) -> NodeResult<()> {
        let address = key.address();
        self.keys.set(key)?;
        let _ = self.key_events.send(Some(address));
        Ok(())
    }

    /// Generate a fresh signing key, load it and return it.
    pub fn generate_signing_key(&self) -> NodeResult<KeyPair> {
        let key = KeyPair::generate();
        self.set_signing_key(key.clone())?;
        tracing::info!(address = %key.address(), "Generated signing key");
        Ok(key)
    }

    pub fn clear_signing_key(&self) -> NodeResult<()> {
        self.keys.clear()?;
        let _ = self.key_events.send(None);
        Ok(())
    }

    // ---- wallet ----

    /// Confirmed wallet balance in satoshis.
    pub fn wallet_balance(&self) -> NodeResult<u64> {
        let client = self.lightning.as_ref().ok_or(NodeError::NoLightningClient)?;
        Ok(client.get_wallet_balance()?)
    }

    // ---- notifications ----

    pub fn subscribe_peers_changed(&self) -> broadcast::Receiver<Vec<PeerSnapshot>> {
        self.p2p.subscribe_peers_changed()
    }

    /// Receives the full follow list after every change.
    pub fn subscribe_follows_changed(&self) -> broadcast::Receiver<Vec<Address>> {
        self.follow_events.subscribe()
    }

    /// Receives the new key's address, or `None` when cleared.
    pub fn subscribe_key_changed(&self) -> broadcast::Receiver<Option<Address>> {
        self.key_events.subscribe()
    }

    /// Receives the hash of every newly stored squeak, local or remote.
    pub fn subscribe_squeaks_changed(&self) -> broadcast::Receiver<SqueakHash> {
        self.p2p.subscribe_squeaks()
    }
}

fn check_sync_interval(period: Duration) -> NodeResult<()> {
    if period.is_zero() {
        return Err(NodeError::InvalidConfig(
            "sync interval must be non-zero".to_string(),
        ));
    }
    Ok(())
}

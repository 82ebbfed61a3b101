//! P2P configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{P2pError, P2pResult};

/// Network magic bytes opening every frame.
pub const NETWORK_MAGIC: [u8; 4] = [0x53, 0x51, 0x4B, 0x01]; // "SQK\x01"

/// Maximum frame size in bytes, header included (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Protocol version announced in version messages.
pub const PROTOCOL_VERSION: u32 = 70002;

/// Oldest protocol version we will talk to.
pub const MIN_PROTOCOL_VERSION: u32 = 70001;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8555;

/// Below this many handshaked peers the node asks for more addresses.
pub const DEFAULT_MIN_PEERS: usize = 5;

/// Maximum number of connections.
pub const DEFAULT_MAX_PEERS: usize = 10;

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time from connect within which the handshake must complete.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// A peer silent for this long is disconnected.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(600);

/// Time allowed for a pong to come back.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keepalive pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between per-peer health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Bytes requested from the socket per read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Default user agent string.
pub const DEFAULT_USER_AGENT: &str = "/squeak-rs:0.1.0/";

/// Configuration for the P2P node.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Address to bind the listener to.
    pub bind_addr: SocketAddr,

    /// Handshaked peer count below which the node looks for more peers.
    pub min_peers: usize,

    /// Maximum number of connections.
    pub max_peers: usize,

    /// Timeout for establishing outbound connections.
    pub connect_timeout: Duration,

    /// Timeout for completing the handshake, measured from connect time.
    pub handshake_timeout: Duration,

    /// Disconnect peers that send nothing for this long.
    pub inactivity_timeout: Duration,

    /// Interval between ping messages.
    pub ping_interval: Duration,

    /// Timeout waiting for pong response.
    pub ping_timeout: Duration,

    /// Interval of the per-peer health check.
    pub health_check_interval: Duration,

    /// User agent string to send in version messages.
    pub user_agent: String,

    /// Peers to dial on startup.
    pub bootstrap_peers: Vec<SocketAddr>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            min_peers: DEFAULT_MIN_PEERS,
            max_peers: DEFAULT_MAX_PEERS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bootstrap_peers: Vec::new(),
        }
    }
}

impl P2pConfig {
    /// Create a new configuration with the specified bind address.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Set the minimum peer count.
    pub fn with_min_peers(mut self, count: usize) -> Self {
        self.min_peers = count;
        self
    }

    /// Set the maximum peer count.
    pub fn with_max_peers(mut self, count: usize) -> Self {
        self.max_peers = count;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the inactivity timeout.
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set the ping interval and pong timeout.
    pub fn with_ping(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    /// Set the health check interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Add bootstrap peers to connect to on startup.
    pub fn with_bootstrap_peers(mut self, peers: Vec<SocketAddr>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    /// Reject a zero health check interval, which the per-peer timer cannot run with.
    pub fn validate(&self) -> P2pResult<()> {
        if self.health_check_interval.is_zero() {
            return Err(P2pError::InvalidConfig(
                "health check interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

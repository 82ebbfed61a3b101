//! Node configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use squeak_core::KeyPair;
use squeak_p2p::config::{DEFAULT_MAX_PEERS, DEFAULT_MIN_PEERS, DEFAULT_PORT};
use squeak_p2p::P2pConfig;

use crate::cli::Cli;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// P2P listen address.
    pub p2p_addr: SocketAddr,

    /// RPC listen address.
    pub rpc_addr: SocketAddr,

    /// Peers to dial on startup.
    pub seed_peers: Vec<SocketAddr>,

    /// Host and port to resolve and dial on startup.
    pub connect_host: Option<(String, u16)>,

    pub min_peers: usize,
    pub max_peers: usize,

    /// Interval of the find-peers / find-content loop.
    pub sync_interval: Duration,

    /// Tip height of the built-in regtest chain.
    pub regtest_height: u32,

    /// Signing key loaded at startup.
    pub signing_key: Option<KeyPair>,

    /// Log level.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let signing_key = match (&cli.signing_key, &cli.signing_key_file) {
            (Some(hex), _) => Some(KeyPair::from_hex(hex).context("invalid --signing-key")?),
            (None, Some(path)) => Some(load_signing_key(path)?),
            (None, None) => None,
        };

        let connect_host = cli
            .connect_host
            .as_deref()
            .map(parse_host_port)
            .transpose()?;

        Ok(Self {
            p2p_addr: cli.listen,
            rpc_addr: cli.rpc_listen,
            seed_peers: cli.seed_peers.clone().unwrap_or_default(),
            connect_host,
            min_peers: cli.min_peers,
            max_peers: cli.max_peers,
            sync_interval: Duration::from_secs(cli.sync_interval_secs),
            regtest_height: cli.regtest_height,
            signing_key,
            log_level: cli.log_level.clone(),
        })
    }

    /// Build P2P configuration from node config.
    pub fn p2p_config(&self) -> P2pConfig {
        P2pConfig::new(self.p2p_addr)
            .with_min_peers(self.min_peers)
            .with_max_peers(self.max_peers)
            .with_bootstrap_peers(self.seed_peers.clone())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            p2p_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT + 1)),
            seed_peers: Vec::new(),
            connect_host: None,
            min_peers: DEFAULT_MIN_PEERS,
            max_peers: DEFAULT_MAX_PEERS,
            sync_interval: Duration::from_secs(10),
            regtest_height: 100,
            signing_key: None,
            log_level: "info".to_string(),
        }
    }
}

/// Read a hex signing key from `path`.
pub fn load_signing_key(path: &Path) -> anyhow::Result<KeyPair> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading signing key from {}", path.display()))?;
    KeyPair::from_hex(contents.trim())
        .with_context(|| format!("invalid signing key in {}", path.display()))
}

/// Split `host[:port]`, defaulting to the standard P2P port.
pub fn parse_host_port(target: &str) -> anyhow::Result<(String, u16)> {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {}", target))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((target.to_string(), DEFAULT_PORT)),
    }
}

//! Command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use squeak_p2p::config::{DEFAULT_MAX_PEERS, DEFAULT_MIN_PEERS};

/// Squeak protocol node.
#[derive(Parser, Debug, Clone)]
#[command(name = "squeak-node")]
#[command(about = "Squeak protocol node binary")]
#[command(version)]
pub struct Cli {
    /// P2P listen address.
    #[arg(long, default_value = "0.0.0.0:8555")]
    pub listen: SocketAddr,

    /// RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8556")]
    pub rpc_listen: SocketAddr,

    /// Comma-separated list of peers to dial on startup.
    #[arg(long, value_delimiter = ',')]
    pub seed_peers: Option<Vec<SocketAddr>>,

    /// Hostname (optionally host:port) to resolve and dial on startup.
    #[arg(long)]
    pub connect_host: Option<String>,

    /// Below this many handshaked peers the node asks for more addresses.
    #[arg(long, default_value_t = DEFAULT_MIN_PEERS)]
    pub min_peers: usize,

    /// Maximum number of peer connections.
    #[arg(long, default_value_t = DEFAULT_MAX_PEERS)]
    pub max_peers: usize,

    /// Seconds between peer discovery and content sync rounds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval_secs: u64,

    /// Tip height of the built-in regtest chain.
    #[arg(long, default_value_t = 100)]
    pub regtest_height: u32,

    /// Hex-encoded signing key to load at startup.
    #[arg(long, conflicts_with = "signing_key_file")]
    pub signing_key: Option<String>,

    /// File holding a hex-encoded signing key.
    #[arg(long)]
    pub signing_key_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

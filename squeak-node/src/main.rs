//! Squeak protocol node binary.
//!
//! Composes the protocol crates into a running node with a JSON-RPC API.

use std::sync::Arc;

use squeak_core::MemoryBlockchain;
use tracing_subscriber::EnvFilter;

use squeak_node::cli::Cli;
use squeak_node::config::NodeConfig;
use squeak_node::SqueakNode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Squeak Node v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = NodeConfig::from_cli(&cli)?;

    // Create and run node
    let blockchain = Arc::new(MemoryBlockchain::regtest(config.regtest_height));
    let node = Arc::new(SqueakNode::new(config, blockchain)?);
    node.run().await?;

    Ok(())
}

//! JSON-RPC server.
//!
//! Methods are grouped by area, each file registering its own. Hashes,
//! addresses and keys travel as lowercase hex strings.

pub mod follows;
pub mod keys;
pub mod network;
pub mod squeaks;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use squeak_core::{Address, SqueakHash};

use crate::error::NodeError;
use crate::node::SqueakNode;

/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Internal error.
pub const INTERNAL_ERROR: i32 = -32603;
/// Publishing without a signing key.
pub const MISSING_SIGNING_KEY: i32 = -32000;

/// Shared state for RPC handlers.
pub struct RpcState {
    pub node: Arc<SqueakNode>,
}

impl RpcState {
    /// Create new RPC state.
    pub fn new(node: Arc<SqueakNode>) -> Self {
        Self { node }
    }
}

/// Build the complete RPC module with all methods.
pub fn build_rpc_module(state: Arc<RpcState>) -> anyhow::Result<RpcModule<Arc<RpcState>>> {
    let mut module = RpcModule::new(state);

    network::register_methods(&mut module)?;
    keys::register_methods(&mut module)?;
    squeaks::register_methods(&mut module)?;
    follows::register_methods(&mut module)?;

    Ok(module)
}

/// RPC server handle with local address.
pub struct RpcServerHandle {
    handle: ServerHandle,
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the server.
    pub fn stop(&self) -> anyhow::Result<()> {
        self.handle
            .stop()
            .map_err(|e| anyhow::anyhow!("Failed to stop server: {:?}", e))
    }
}

/// Start the JSON-RPC server.
pub async fn start_rpc_server(
    addr: SocketAddr,
    state: Arc<RpcState>,
) -> anyhow::Result<RpcServerHandle> {
    let server = ServerBuilder::default().build(addr).await?;
    let local_addr = server.local_addr()?;

    let module = build_rpc_module(state)?;

    tracing::info!("Starting JSON-RPC server on {}", local_addr);

    let handle = server.start(module);

    Ok(RpcServerHandle { handle, local_addr })
}

pub(crate) fn invalid_params(msg: impl fmt::Display) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INVALID_PARAMS, msg.to_string(), None::<()>)
}

pub(crate) fn internal_error(msg: impl fmt::Display) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INTERNAL_ERROR, msg.to_string(), None::<()>)
}

impl From<NodeError> for ErrorObjectOwned {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::MissingSigningKey => {
                ErrorObjectOwned::owned(MISSING_SIGNING_KEY, e.to_string(), None::<()>)
            }
            other => internal_error(other),
        }
    }
}

pub(crate) fn parse_hash(s: &str) -> Result<SqueakHash, ErrorObjectOwned> {
    let bytes = hex::decode(s).map_err(|e| invalid_params(format!("Invalid hash: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| invalid_params("Invalid hash: expected 32 bytes"))
}

pub(crate) fn parse_address(s: &str) -> Result<Address, ErrorObjectOwned> {
    s.parse()
        .map_err(|e| invalid_params(format!("Invalid address: {}", e)))
}

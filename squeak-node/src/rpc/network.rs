//! Network-related RPC methods.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;

use super::{internal_error, invalid_params, RpcState};
use crate::config::parse_host_port;

/// Register network RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) -> anyhow::Result<()> {
    // echo - return the argument unchanged
    module.register_async_method("echo", |params, _state, _| async move {
        let message: String = params.one()?;
        Ok::<_, ErrorObjectOwned>(message)
    })?;

    // addpeer - dial "ip:port" directly, or resolve "host[:port]"
    module.register_async_method("addpeer", |params, state, _| async move {
        let target: String = params.one()?;

        let dialed = match target.parse::<SocketAddr>() {
            Ok(addr) => {
                state.node.connect_peer(addr).await.map_err(internal_error)?;
                1
            }
            Err(_) => {
                let (host, port) = parse_host_port(&target).map_err(invalid_params)?;
                state
                    .node
                    .connect_host(&host, port)
                    .await
                    .map_err(internal_error)?
            }
        };

        tracing::info!(target = %target, dialed, "Added peer");
        Ok::<_, ErrorObjectOwned>(dialed)
    })?;

    // getpeers - list connected peers
    module.register_async_method("getpeers", |_params, state, _| async move {
        Ok::<_, ErrorObjectOwned>(state.node.get_peers())
    })?;

    Ok(())
}

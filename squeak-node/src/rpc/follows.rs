//! Follow list RPC methods.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;

use super::{parse_address, RpcState};

/// Register follow RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) -> anyhow::Result<()> {
    module.register_async_method("addfollow", |params, state, _| async move {
        let address: String = params.one()?;
        let added = state.node.add_follow(parse_address(&address)?)?;
        Ok::<_, ErrorObjectOwned>(added)
    })?;

    module.register_async_method("removefollow", |params, state, _| async move {
        let address: String = params.one()?;
        let removed = state.node.remove_follow(&parse_address(&address)?)?;
        Ok::<_, ErrorObjectOwned>(removed)
    })?;

    module.register_async_method("getfollows", |_params, state, _| async move {
        let follows = state.node.get_follows()?;
        Ok::<_, ErrorObjectOwned>(follows.iter().map(|a| a.to_string()).collect::<Vec<_>>())
    })?;

    Ok(())
}

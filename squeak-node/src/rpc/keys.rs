//! Signing key and wallet RPC methods.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::{Deserialize, Serialize};

use super::RpcState;

/// A signing key and its address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKeyInfo {
    pub address: String,
    pub signing_key: String,
}

/// Register key RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) -> anyhow::Result<()> {
    module.register_async_method("generatesigningkey", |_params, state, _| async move {
        let key = state.node.generate_signing_key()?;
        Ok::<_, ErrorObjectOwned>(SigningKeyInfo {
            address: key.address().to_string(),
            signing_key: key.to_hex(),
        })
    })?;

    module.register_async_method("getsigningkey", |_params, state, _| async move {
        let key = state.node.get_signing_key()?;
        Ok::<_, ErrorObjectOwned>(key.map(|k| k.to_hex()))
    })?;

    module.register_async_method("getaddress", |_params, state, _| async move {
        let address = state.node.get_address()?;
        Ok::<_, ErrorObjectOwned>(address.map(|a| a.to_string()))
    })?;

    module.register_async_method("getwalletbalance", |_params, state, _| async move {
        Ok::<_, ErrorObjectOwned>(state.node.wallet_balance()?)
    })?;

    Ok(())
}

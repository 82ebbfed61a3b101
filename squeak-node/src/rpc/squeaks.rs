//! Squeak RPC methods.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::{Deserialize, Serialize};
use squeak_core::Squeak;

use super::{parse_address, parse_hash, RpcState};

/// JSON view of a squeak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqueakView {
    pub hash: String,
    pub author: String,
    pub reply_to: Option<String>,
    pub block_height: u32,
    pub block_hash: String,
    pub timestamp: u64,
    pub content: String,
}

impl From<&Squeak> for SqueakView {
    fn from(squeak: &Squeak) -> Self {
        Self {
            hash: hex::encode(squeak.hash()),
            author: squeak.address().to_string(),
            reply_to: squeak.is_reply().then(|| hex::encode(squeak.reply_to)),
            block_height: squeak.block_height,
            block_hash: hex::encode(squeak.block_hash),
            timestamp: squeak.timestamp,
            content: squeak.content_str(),
        }
    }
}

/// Register squeak RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) -> anyhow::Result<()> {
    // makesqueak(content, [reply_to]) - publish and return the hash
    module.register_async_method("makesqueak", |params, state, _| async move {
        let mut seq = params.sequence();
        let content: String = seq.next()?;
        let reply_to: Option<String> = seq.optional_next()?;
        let reply_to = reply_to.as_deref().map(parse_hash).transpose()?;

        let hash = state.node.publish(&content, reply_to)?;
        Ok::<_, ErrorObjectOwned>(hex::encode(hash))
    })?;

    module.register_async_method("getsqueak", |params, state, _| async move {
        let hash: String = params.one()?;
        let hash = parse_hash(&hash)?;
        let squeak = state.node.get_squeak(&hash)?;
        Ok::<_, ErrorObjectOwned>(squeak.as_ref().map(SqueakView::from))
    })?;

    // getsqueaks([author]) - all squeaks, or one author's
    module.register_async_method("getsqueaks", |params, state, _| async move {
        let mut seq = params.sequence();
        let author: Option<String> = seq.optional_next()?;

        let squeaks = match author {
            Some(author) => state.node.get_squeaks_by_author(&parse_address(&author)?)?,
            None => state.node.get_squeaks()?,
        };
        let views: Vec<SqueakView> = squeaks.iter().map(SqueakView::from).collect();
        Ok::<_, ErrorObjectOwned>(views)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use squeak_core::{KeyPair, MemoryBlockchain, SqueakMaker, NULL_HASH};

    #[test]
    fn test_squeak_view() {
        let chain = MemoryBlockchain::regtest(3);
        let key = KeyPair::generate();
        let maker = SqueakMaker::new(&key, &chain);

        let root = maker.make_squeak("root", NULL_HASH).unwrap();
        let view = SqueakView::from(&root);
        assert_eq!(view.hash, hex::encode(root.hash()));
        assert_eq!(view.author, key.address().to_string());
        assert_eq!(view.reply_to, None);
        assert_eq!(view.block_height, 3);
        assert_eq!(view.content, "root");

        let reply = maker.make_squeak("reply", root.hash()).unwrap();
        assert_eq!(SqueakView::from(&reply).reply_to, Some(view.hash));
    }
}

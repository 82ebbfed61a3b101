//! Blockchain and lightning collaborators.
//!
//! Squeaks are bound to a block height and hash, so making and validating
//! them needs a view of the chain. The node only ever asks two questions of
//! it, captured by [`Blockchain`].

use std::sync::RwLock;

use crate::crypto::sha256_concat;
use crate::error::BackendError;

/// Read-only view of a blockchain.
pub trait Blockchain: Send + Sync {
    /// Height of the current chain tip.
    fn get_block_count(&self) -> Result<u32, BackendError>;

    /// Hash of the block at `height`, or `None` above the tip.
    fn get_block_hash(&self, height: u32) -> Result<Option<[u8; 32]>, BackendError>;
}

/// Payment backend queried for the node's wallet balance.
pub trait LightningClient: Send + Sync {
    /// Confirmed wallet balance in satoshis.
    fn get_wallet_balance(&self) -> Result<u64, BackendError>;
}

/// In-process chain with deterministic block hashes.
///
/// Used for regtest-style nodes and tests. Block `n` hashes to
/// `sha256("squeak-regtest" || n)`.
#[derive(Debug)]
pub struct MemoryBlockchain {
    hashes: RwLock<Vec<[u8; 32]>>,
}

impl MemoryBlockchain {
    /// Chain whose tip is at `height`.
    pub fn regtest(height: u32) -> Self {
        let hashes = (0..=height).map(regtest_hash).collect();
        Self {
            hashes: RwLock::new(hashes),
        }
    }

    /// Append one block and return its hash.
    pub fn mine(&self) -> [u8; 32] {
        let mut hashes = self.hashes.write().unwrap_or_else(|e| e.into_inner());
        let hash = regtest_hash(hashes.len() as u32);
        hashes.push(hash);
        hash
    }
}

fn regtest_hash(height: u32) -> [u8; 32] {
    sha256_concat(&[b"squeak-regtest", &height.to_le_bytes()])
}

impl Blockchain for MemoryBlockchain {
    fn get_block_count(&self) -> Result<u32, BackendError> {
        let hashes = self.hashes.read().unwrap_or_else(|e| e.into_inner());
        Ok(hashes.len().saturating_sub(1) as u32)
    }

    fn get_block_hash(&self, height: u32) -> Result<Option<[u8; 32]>, BackendError> {
        let hashes = self.hashes.read().unwrap_or_else(|e| e.into_inner());
        Ok(hashes.get(height as usize).copied())
    }
}

//! The squeak content item.
//!
//! A squeak is a short signed message bound to a block of the underlying
//! blockchain. The block binding timestamps it: a squeak cannot claim to be
//! older than the block it references.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::chain::Blockchain;
use crate::crypto::{derive_address, sha256_concat, sign, verify, Address, KeyPair, PublicKey, Signature};
use crate::error::SqueakError;

/// Current squeak format version.
pub const SQUEAK_VERSION: u32 = 1;

/// Maximum content length in bytes (280 characters of up to 4 bytes each).
pub const MAX_CONTENT_LENGTH: usize = 1120;

/// Canonical squeak hash.
pub type SqueakHash = [u8; 32];

/// All-zero hash: "not a reply" in a squeak, "any reply target" in an interest.
pub const NULL_HASH: SqueakHash = [0u8; 32];

/// A signed, block-bound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squeak {
    /// Format version.
    pub version: u32,
    /// Author's public key.
    pub author: PublicKey,
    /// Hash of the squeak this replies to, or [`NULL_HASH`].
    pub reply_to: SqueakHash,
    /// Height of the referenced block.
    pub block_height: u32,
    /// Hash of the referenced block.
    pub block_hash: [u8; 32],
    /// Unix time the squeak was made.
    pub timestamp: u64,
    /// Encoded content.
    pub content: Vec<u8>,
    /// Author's signature over [`Squeak::hash`].
    pub signature: Signature,
}

impl Squeak {
    /// Build and sign a squeak.
    pub fn new_signed(
        keypair: &KeyPair,
        content: Vec<u8>,
        reply_to: SqueakHash,
        block_height: u32,
        block_hash: [u8; 32],
        timestamp: u64,
    ) -> Result<Self, SqueakError> {
        check_content_length(&content)?;

        let author = keypair.public_key();
        let hash = header_hash(SQUEAK_VERSION, &author, &reply_to, block_height, &block_hash, timestamp, &content);

        Ok(Self {
            version: SQUEAK_VERSION,
            author,
            reply_to,
            block_height,
            block_hash,
            timestamp,
            content,
            signature: sign(keypair.signing_key(), &hash),
        })
    }

    /// Canonical hash: SHA-256 over every field except the signature.
    pub fn hash(&self) -> SqueakHash {
        header_hash(
            self.version,
            &self.author,
            &self.reply_to,
            self.block_height,
            &self.block_hash,
            self.timestamp,
            &self.content,
        )
    }

    /// Address of the author.
    pub fn address(&self) -> Address {
        derive_address(&self.author)
    }

    /// True if this squeak replies to another.
    pub fn is_reply(&self) -> bool {
        self.reply_to != NULL_HASH
    }

    /// Content decoded as UTF-8, replacing invalid sequences.
    pub fn content_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Context-free checks: content length and signature.
    pub fn check(&self) -> Result<(), SqueakError> {
        check_content_length(&self.content)?;
        verify(&self.author, &self.hash(), &self.signature).map_err(|_| SqueakError::InvalidSignature)
    }
}

impl fmt::Display for Squeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Squeak(hash={}, author={}, height={})",
            hex::encode(self.hash()),
            self.address(),
            self.block_height
        )
    }
}

fn check_content_length(content: &[u8]) -> Result<(), SqueakError> {
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(SqueakError::ContentTooLong {
            len: content.len(),
            max: MAX_CONTENT_LENGTH,
        });
    }
    Ok(())
}

fn header_hash(
    version: u32,
    author: &PublicKey,
    reply_to: &SqueakHash,
    block_height: u32,
    block_hash: &[u8; 32],
    timestamp: u64,
    content: &[u8],
) -> SqueakHash {
    sha256_concat(&[
        &version.to_le_bytes(),
        author.as_bytes(),
        reply_to,
        &block_height.to_le_bytes(),
        block_hash,
        &timestamp.to_le_bytes(),
        &(content.len() as u64).to_le_bytes(),
        content,
    ])
}

/// Makes squeaks signed by one key and bound to the current chain tip.
pub struct SqueakMaker<'a> {
    keypair: &'a KeyPair,
    blockchain: &'a dyn Blockchain,
}

impl<'a> SqueakMaker<'a> {
    /// Maker for `keypair` against `blockchain`.
    pub fn new(keypair: &'a KeyPair, blockchain: &'a dyn Blockchain) -> Self {
        Self { keypair, blockchain }
    }

    /// Make a squeak at the current tip, stamped with the current time.
    pub fn make_squeak(&self, content: &str, reply_to: SqueakHash) -> Result<Squeak, SqueakError> {
        let block_height = self.blockchain.get_block_count()?;
        let block_hash = self
            .blockchain
            .get_block_hash(block_height)?
            .ok_or(SqueakError::UnknownBlock { height: block_height })?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Squeak::new_signed(
            self.keypair,
            content.as_bytes().to_vec(),
            reply_to,
            block_height,
            block_hash,
            timestamp,
        )
    }
}

/// Validates squeaks against a blockchain.
pub struct SqueakValidator<'a> {
    blockchain: &'a dyn Blockchain,
}

impl<'a> SqueakValidator<'a> {
    /// Validator backed by `blockchain`.
    pub fn new(blockchain: &'a dyn Blockchain) -> Self {
        Self { blockchain }
    }

    /// Full validation: [`Squeak::check`] then the block binding.
    pub fn validate(&self, squeak: &Squeak) -> Result<(), SqueakError> {
        squeak.check()?;
        self.check_block(squeak)
    }

    /// The referenced block must exist with the claimed hash.
    pub fn check_block(&self, squeak: &Squeak) -> Result<(), SqueakError> {
        let height = squeak.block_height;
        match self.blockchain.get_block_hash(height)? {
            None => Err(SqueakError::UnknownBlock { height }),
            Some(hash) if hash != squeak.block_hash => Err(SqueakError::BlockMismatch { height }),
            Some(_) => Ok(()),
        }
    }
}

//! Author address derivation.
//!
//! A squeak address is the first 20 bytes of SHA-256 of the author's
//! Ed25519 public key. Addresses are what users follow, and what locator
//! interests are keyed on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::hashing::sha256;
use super::keys::PublicKey;
use crate::error::CryptoError;

/// 20-byte author address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidHex(format!("expected 20 bytes, got {}", v.len())))?;
        Ok(Address(bytes))
    }
}

/// Derive the address of a public key.
pub fn derive_address(public_key: &PublicKey) -> Address {
    let hash = sha256(public_key.as_bytes());
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[..20]);
    Address(address)
}

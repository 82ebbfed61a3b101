//! Cryptographic primitives for the squeak protocol.
//!
//! - Ed25519 signing keys, signing, and verification
//! - SHA-256 and double SHA-256 hashing
//! - Author addresses (first 20 bytes of SHA-256 of the public key)

mod address;
mod hashing;
mod keys;
mod signing;

pub use address::{derive_address, Address};
pub use hashing::{sha256, sha256_concat, sha256d};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use signing::{sign, verify, Signature};

//! # Squeak Core
//!
//! Core types, cryptography, and serialization for the squeak protocol.
//!
//! This crate is the foundation shared by storage, networking, and the node:
//! - Ed25519 signing keys, SHA-256 hashing, and 20-byte author addresses
//! - The signed, block-bound content item ([`Squeak`])
//! - Locators used to ask peers for squeaks by author, height, and reply target
//! - The blockchain and lightning collaborator interfaces
//! - Deterministic binary serialization

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod crypto;
pub mod error;
pub mod locator;
pub mod serialization;
pub mod squeak;

pub use chain::{Blockchain, LightningClient, MemoryBlockchain};
pub use crypto::{Address, KeyPair, PublicKey, Signature};
pub use error::{BackendError, CoreError, CryptoError, SerializationError, SqueakError};
pub use locator::{Interest, Locator, UNBOUNDED_HEIGHT};
pub use squeak::{Squeak, SqueakHash, SqueakMaker, SqueakValidator, MAX_CONTENT_LENGTH, NULL_HASH};

//! # Squeak Storage
//!
//! Stores for the application state a squeak node keeps:
//! - Squeaks, keyed by their canonical hash and queryable by locator
//! - The node's signing key
//! - The list of followed addresses
//!
//! Each store is a trait so the node can be wired to any backend. The
//! in-memory implementations guard their data with their own lock, so
//! network handlers touching the squeak store never contend with
//! application reads of the follow list.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod follows;
pub mod keys;
pub mod squeak;

pub use error::{StorageError, StorageResult};
pub use follows::{FollowStore, MemoryFollowStore};
pub use keys::{KeyStore, MemoryKeyStore};
pub use squeak::{MemorySqueakStore, SqueakStore, ValidatingSqueakStore};

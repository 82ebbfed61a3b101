//! Squeak storage.
//!
//! Squeaks are content addressed: the key of every entry is the squeak's
//! canonical hash, so inserting the same squeak twice is a no-op.

mod memory;
mod validating;

pub use memory::MemorySqueakStore;
pub use validating::ValidatingSqueakStore;

use squeak_core::{Address, Locator, Squeak, SqueakHash};

use crate::error::StorageResult;

/// A store of all the squeaks held by a node.
pub trait SqueakStore: Send + Sync {
    /// Hashes of every stored squeak.
    fn get_hashes(&self) -> StorageResult<Vec<SqueakHash>>;

    /// Every stored squeak.
    fn get_squeaks(&self) -> StorageResult<Vec<Squeak>>;

    /// The squeak with `hash`, if stored.
    fn get_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>>;

    /// Insert `squeak` under its hash.
    ///
    /// Returns true if the squeak was not already stored.
    fn add_squeak(&self, squeak: Squeak) -> StorageResult<bool>;

    /// Remove and return the squeak with `hash`, if stored.
    fn remove_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>>;

    /// Squeaks written by `address`.
    fn get_squeaks_by_author(&self, address: &Address) -> StorageResult<Vec<Squeak>>;

    /// Squeaks matching any interest of `locator`.
    fn get_squeaks_by_locator(&self, locator: &Locator) -> StorageResult<Vec<Squeak>>;

    /// Whether a squeak with `hash` is stored.
    fn contains(&self, hash: &SqueakHash) -> StorageResult<bool> {
        Ok(self.get_squeak(hash)?.is_some())
    }
}

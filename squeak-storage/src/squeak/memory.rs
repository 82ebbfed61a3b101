use std::collections::BTreeMap;
use std::sync::RwLock;

use squeak_core::{Address, Locator, Squeak, SqueakHash};

use super::SqueakStore;
use crate::error::{StorageError, StorageResult};

/// In-memory [`SqueakStore`] ordered by hash.
///
/// Only squeaks passing [`Squeak::check`] are accepted.
#[derive(Debug, Default)]
pub struct MemorySqueakStore {
    squeaks: RwLock<BTreeMap<SqueakHash, Squeak>>,
}

impl MemorySqueakStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored squeaks.
    pub fn len(&self) -> usize {
        self.squeaks.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, keep: impl Fn(&Squeak) -> bool) -> StorageResult<Vec<Squeak>> {
        let squeaks = self.squeaks.read().map_err(StorageError::poisoned("squeaks"))?;
        Ok(squeaks.values().filter(|s| keep(s)).cloned().collect())
    }
}

impl SqueakStore for MemorySqueakStore {
    fn get_hashes(&self) -> StorageResult<Vec<SqueakHash>> {
        let squeaks = self.squeaks.read().map_err(StorageError::poisoned("squeaks"))?;
        Ok(squeaks.keys().copied().collect())
    }

    fn get_squeaks(&self) -> StorageResult<Vec<Squeak>> {
        self.filtered(|_| true)
    }

    fn get_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
        let squeaks = self.squeaks.read().map_err(StorageError::poisoned("squeaks"))?;
        Ok(squeaks.get(hash).cloned())
    }

    fn add_squeak(&self, squeak: Squeak) -> StorageResult<bool> {
        squeak.check()?;
        let hash = squeak.hash();
        let mut squeaks = self.squeaks.write().map_err(StorageError::poisoned("squeaks"))?;
        let added = squeaks.insert(hash, squeak).is_none();
        if added {
            tracing::trace!(hash = %hex_prefix(&hash), "Stored squeak");
        }
        Ok(added)
    }

    fn remove_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
        let mut squeaks = self.squeaks.write().map_err(StorageError::poisoned("squeaks"))?;
        Ok(squeaks.remove(hash))
    }

    fn get_squeaks_by_author(&self, address: &Address) -> StorageResult<Vec<Squeak>> {
        self.filtered(|s| s.address() == *address)
    }

    fn get_squeaks_by_locator(&self, locator: &Locator) -> StorageResult<Vec<Squeak>> {
        self.filtered(|s| locator.matches(s))
    }
}

fn hex_prefix(hash: &SqueakHash) -> String {
    hex::encode(&hash[..4])
}

//! Followed-address storage.

use std::sync::RwLock;

use squeak_core::Address;

use crate::error::{StorageError, StorageResult};

/// The addresses a node follows.
pub trait FollowStore: Send + Sync {
    /// Followed addresses in insertion order.
    fn list(&self) -> StorageResult<Vec<Address>>;

    /// Follow `address`. Returns false if it was already followed.
    fn add(&self, address: Address) -> StorageResult<bool>;

    /// Unfollow `address`. Returns false if it was not followed.
    fn remove(&self, address: &Address) -> StorageResult<bool>;
}

/// In-memory [`FollowStore`].
#[derive(Debug, Default)]
pub struct MemoryFollowStore {
    follows: RwLock<Vec<Address>>,
}

impl MemoryFollowStore {
    /// Create an empty follow store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FollowStore for MemoryFollowStore {
    fn list(&self) -> StorageResult<Vec<Address>> {
        let follows = self.follows.read().map_err(StorageError::poisoned("follows"))?;
        Ok(follows.clone())
    }

    fn add(&self, address: Address) -> StorageResult<bool> {
        let mut follows = self.follows.write().map_err(StorageError::poisoned("follows"))?;
        if follows.contains(&address) {
            return Ok(false);
        }
        follows.push(address);
        Ok(true)
    }

    fn remove(&self, address: &Address) -> StorageResult<bool> {
        let mut follows = self.follows.write().map_err(StorageError::poisoned("follows"))?;
        let before = follows.len();
        follows.retain(|a| a != address);
        Ok(follows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_deduplicated() {
        let store = MemoryFollowStore::new();
        let a = Address([1u8; 20]);
        let b = Address([2u8; 20]);

        assert!(store.add(a).unwrap());
        assert!(store.add(b).unwrap());
        assert!(!store.add(a).unwrap());
        assert_eq!(store.list().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = MemoryFollowStore::new();
        let a = Address([1u8; 20]);

        assert!(!store.remove(&a).unwrap());
        store.add(a).unwrap();
        assert!(store.remove(&a).unwrap());
        assert!(store.list().unwrap().is_empty());
    }
}

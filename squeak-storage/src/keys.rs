//! Signing key storage.

use std::sync::RwLock;

use squeak_core::KeyPair;

use crate::error::{StorageError, StorageResult};

/// Holds at most one signing key.
pub trait KeyStore: Send + Sync {
    /// The current signing key, if any.
    fn get(&self) -> StorageResult<Option<KeyPair>>;

    /// Replace the signing key.
    fn set(&self, key: KeyPair) -> StorageResult<()>;

    /// Forget the signing key.
    fn clear(&self) -> StorageResult<()>;
}

/// In-memory [`KeyStore`].
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: RwLock<Option<KeyPair>>,
}

impl MemoryKeyStore {
    /// Create an empty key store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self) -> StorageResult<Option<KeyPair>> {
        let key = self.key.read().map_err(StorageError::poisoned("keys"))?;
        Ok(key.clone())
    }

    fn set(&self, key: KeyPair) -> StorageResult<()> {
        *self.key.write().map_err(StorageError::poisoned("keys"))? = Some(key);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        *self.key.write().map_err(StorageError::poisoned("keys"))? = None;
        Ok(())
    }
}

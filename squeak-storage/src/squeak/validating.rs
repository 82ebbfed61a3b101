use std::sync::Arc;

use squeak_core::{Address, Blockchain, Locator, Squeak, SqueakHash, SqueakValidator};

use super::SqueakStore;
use crate::error::StorageResult;

/// Wraps a store so inserts must also be bound to a known block.
pub struct ValidatingSqueakStore<S> {
    inner: S,
    blockchain: Arc<dyn Blockchain>,
}

impl<S: SqueakStore> ValidatingSqueakStore<S> {
    /// Validate inserts into `inner` against `blockchain`.
    pub fn new(inner: S, blockchain: Arc<dyn Blockchain>) -> Self {
        Self { inner, blockchain }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SqueakStore> SqueakStore for ValidatingSqueakStore<S> {
    fn get_hashes(&self) -> StorageResult<Vec<SqueakHash>> {
        self.inner.get_hashes()
    }

    fn get_squeaks(&self) -> StorageResult<Vec<Squeak>> {
        self.inner.get_squeaks()
    }

    fn get_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
        self.inner.get_squeak(hash)
    }

    fn add_squeak(&self, squeak: Squeak) -> StorageResult<bool> {
        SqueakValidator::new(self.blockchain.as_ref()).validate(&squeak)?;
        self.inner.add_squeak(squeak)
    }

    fn remove_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
        self.inner.remove_squeak(hash)
    }

    fn get_squeaks_by_author(&self, address: &Address) -> StorageResult<Vec<Squeak>> {
        self.inner.get_squeaks_by_author(address)
    }

    fn get_squeaks_by_locator(&self, locator: &Locator) -> StorageResult<Vec<Squeak>> {
        self.inner.get_squeaks_by_locator(locator)
    }

    fn contains(&self, hash: &SqueakHash) -> StorageResult<bool> {
        self.inner.contains(hash)
    }
}

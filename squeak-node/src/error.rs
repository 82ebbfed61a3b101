//! Node error types.

use squeak_core::{BackendError, CryptoError, SqueakError};
use squeak_p2p::P2pError;
use squeak_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by [`SqueakNode`](crate::node::SqueakNode) operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Publishing requires a signing key.
    #[error("No signing key loaded")]
    MissingSigningKey,

    #[error("No lightning client configured")]
    NoLightningClient,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Squeak error: {0}")]
    Squeak(#[from] SqueakError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("P2P error: {0}")]
    P2p(#[from] P2pError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

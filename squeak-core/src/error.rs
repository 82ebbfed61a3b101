//! Error types for the squeak core crate.

use std::fmt;

/// Top-level error type for squeak-core operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// Cryptographic operation failed.
    Crypto(CryptoError),
    /// Serialization or deserialization failed.
    Serialization(SerializationError),
    /// A squeak could not be made or failed validation.
    Squeak(SqueakError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Crypto(e) => write!(f, "crypto error: {}", e),
            CoreError::Serialization(e) => write!(f, "serialization error: {}", e),
            CoreError::Squeak(e) => write!(f, "squeak error: {}", e),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<CryptoError> for CoreError {
    fn from(e: CryptoError) -> Self {
        CoreError::Crypto(e)
    }
}

impl From<SerializationError> for CoreError {
    fn from(e: SerializationError) -> Self {
        CoreError::Serialization(e)
    }
}

impl From<SqueakError> for CoreError {
    fn from(e: SqueakError) -> Self {
        CoreError::Squeak(e)
    }
}

/// Errors related to cryptographic operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// The public key is malformed or invalid.
    InvalidPublicKey,
    /// The secret key is malformed or invalid.
    InvalidSecretKey,
    /// A hex string could not be decoded to the expected length.
    InvalidHex(String),
    /// Signature verification failed (signature doesn't match message/key).
    SignatureVerificationFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidPublicKey => write!(f, "invalid public key format"),
            CryptoError::InvalidSecretKey => write!(f, "invalid secret key format"),
            CryptoError::InvalidHex(msg) => write!(f, "invalid hex: {}", msg),
            CryptoError::SignatureVerificationFailed => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Errors related to serialization and deserialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to encode data to bytes.
    EncodeFailed(String),
    /// Failed to decode data from bytes.
    DecodeFailed(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::EncodeFailed(msg) => write!(f, "encode failed: {}", msg),
            SerializationError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for SerializationError {}

/// Errors reported by an external backend (blockchain or lightning node).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or returned garbage.
    Unavailable(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Errors raised while making or validating a squeak.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqueakError {
    /// Content exceeds the maximum encoded length.
    ContentTooLong {
        /// Length of the rejected content.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },
    /// The signature does not match the author key and squeak hash.
    InvalidSignature,
    /// The blockchain has no block at the referenced height.
    UnknownBlock {
        /// Height that could not be resolved.
        height: u32,
    },
    /// The referenced block hash does not match the chain at that height.
    BlockMismatch {
        /// Height whose hash disagreed.
        height: u32,
    },
    /// The blockchain backend failed.
    Backend(BackendError),
}

impl fmt::Display for SqueakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqueakError::ContentTooLong { len, max } => {
                write!(f, "content too long: {} bytes (max: {})", len, max)
            }
            SqueakError::InvalidSignature => write!(f, "invalid squeak signature"),
            SqueakError::UnknownBlock { height } => write!(f, "no block at height {}", height),
            SqueakError::BlockMismatch { height } => {
                write!(f, "block hash mismatch at height {}", height)
            }
            SqueakError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SqueakError {}

impl From<BackendError> for SqueakError {
    fn from(e: BackendError) -> Self {
        SqueakError::Backend(e)
    }
}

//! P2P error types.

use std::io;
use std::net::SocketAddr;

use squeak_storage::StorageError;
use thiserror::Error;

/// P2P-specific errors.
///
/// Every variant raised while serving a peer is fatal to that peer only:
/// its worker logs the error and tears the connection down.
#[derive(Debug, Error)]
pub enum P2pError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize a message.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Buffered or declared frame size exceeds the maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame could not be decoded (bad magic, checksum, or payload).
    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    /// The connection is closed.
    #[error("Peer disconnected: {reason}")]
    PeerDisconnected { reason: String },

    /// The peer broke the protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Handshake bookkeeping was driven out of order.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Protocol version incompatible.
    #[error("Incompatible protocol version: {peer_version} (minimum: {min_version})")]
    IncompatibleVersion { peer_version: u32, min_version: u32 },

    /// Already connected to this address.
    #[error("Already connected to peer: {addr}")]
    DuplicatePeer { addr: SocketAddr },

    /// No room for another connection.
    #[error("Maximum connections reached: {max}")]
    MaxConnectionsReached { max: usize },

    /// Connection timed out.
    #[error("Connection timeout to {addr}")]
    ConnectionTimeout { addr: SocketAddr },

    /// Handshake did not complete in time.
    #[error("Handshake timeout")]
    HandshakeTimeout,

    /// Nothing received for too long.
    #[error("Inactivity timeout")]
    InactivityTimeout,

    /// Ping timeout.
    #[error("Ping timeout for peer")]
    PingTimeout,

    /// Hostname could not be resolved.
    #[error("Could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// Squeak store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Node is shutting down.
    #[error("Node shutting down")]
    Shutdown,

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<squeak_core::SerializationError> for P2pError {
    fn from(err: squeak_core::SerializationError) -> Self {
        P2pError::Serialization(err.to_string())
    }
}

impl P2pError {
    pub(crate) fn closed_locally() -> Self {
        P2pError::PeerDisconnected {
            reason: "closed locally".to_string(),
        }
    }
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
